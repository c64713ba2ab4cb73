// Persisted probe results with a whole-file freshness window
use crate::core::network::debug_logger::get_debug_logger;
use crate::core::network::types::{CacheStore, NetworkError, VerdictMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Verdicts older than this are ignored as a whole
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Clock abstraction so freshness can be tested without sleeping
pub trait ClockTrait: Send + Sync {
    /// Current wall-clock time in epoch milliseconds
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl ClockTrait for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Fingerprint-keyed verdict store backed by a single JSON document
///
/// The document carries one timestamp for the whole map, so a save refreshes
/// every entry it writes and a stale file is dropped in one piece.
pub struct ResultCache {
    path: PathBuf,
    freshness_window: Duration,
    clock: Box<dyn ClockTrait>,
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn ClockTrait>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored map if it is still fresh
    ///
    /// A missing, unreadable, corrupt or stale file yields an empty map.
    /// Load never fails.
    pub async fn load(&self) -> VerdictMap {
        let logger = get_debug_logger();

        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(_) => {
                logger.cache_load(0, false);
                return VerdictMap::new();
            }
        };

        let store: CacheStore = match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(e) => {
                logger.warn(
                    "ResultCache",
                    &format!("Ignoring corrupt cache file: {}", e),
                );
                logger.cache_load(0, false);
                return VerdictMap::new();
            }
        };

        let age_ms = self.clock.now_ms().saturating_sub(store.timestamp);
        let window_ms = self.freshness_window.as_millis() as i64;
        if age_ms >= window_ms {
            logger.cache_load(store.results.len(), false);
            return VerdictMap::new();
        }

        logger.cache_load(store.results.len(), true);
        store.results
    }

    /// Replace the stored map and stamp it with the current time
    ///
    /// The write goes through a temporary file and a rename, so readers never
    /// observe a partially written document.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::CacheFileError` if the file cannot be written.
    pub async fn save(&self, results: &VerdictMap) -> Result<(), NetworkError> {
        let outcome = self.write_store(results).await;
        get_debug_logger().cache_save(results.len(), outcome.is_ok());
        outcome
    }

    async fn write_store(&self, results: &VerdictMap) -> Result<(), NetworkError> {
        let store = CacheStore {
            timestamp: self.clock.now_ms(),
            results: results.clone(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                NetworkError::CacheFileError(format!("Failed to create cache directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&store).map_err(|e| {
            NetworkError::CacheFileError(format!("Failed to serialize cache: {}", e))
        })?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).await.map_err(|e| {
            NetworkError::CacheFileError(format!("Failed to write temp cache file: {}", e))
        })?;

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            NetworkError::CacheFileError(format!("Failed to rename cache file: {}", e))
        })?;

        Ok(())
    }
}
