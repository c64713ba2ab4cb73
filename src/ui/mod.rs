pub mod output;
pub mod progress;
pub mod prompt;

pub use progress::{IndicatifProgress, LineProgress};
pub use prompt::InquireChooser;
