pub mod batch;
pub mod debug_logger;
pub mod fingerprint;
pub mod prober;
pub mod result_cache;
pub mod types;

// Re-export commonly used items
pub use batch::{BatchCoordinator, BatchOutcome, NoopProgress, ProgressReporter, UsageRecorder};
pub use debug_logger::{get_debug_logger, DebugLogger};
pub use fingerprint::{fingerprint, profile_fingerprint};
pub use prober::{HttpClientTrait, Prober, ProberOptions, TransportError};
pub use result_cache::{ClockTrait, ResultCache, SystemClock};
pub use types::*;
