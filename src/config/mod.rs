pub mod defaults;
pub mod types;

pub use types::{CacheSettings, ConfigError, LaunchSettings, Paths, ProbeSettings, Settings};
