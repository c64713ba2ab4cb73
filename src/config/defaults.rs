// Built-in values used when config.toml or an environment override is absent

use super::types::{CacheSettings, LaunchSettings, ProbeSettings, Settings};
use crate::core::network::types::default_capability_probes;

/// Directory under the home directory holding every ccswitch file
pub const APP_DIR_NAME: &str = ".switch-claude";

/// Overrides the whole config directory (used by tests)
pub const HOME_ENV: &str = "CCSWITCH_HOME";
pub const TIMEOUT_ENV: &str = "CCSWITCH_TIMEOUT_MS";
pub const MAX_RETRIES_ENV: &str = "CCSWITCH_MAX_RETRIES";
pub const CACHE_TTL_ENV: &str = "CCSWITCH_CACHE_TTL_SECS";

pub const PROVIDERS_FILE: &str = "providers.json";
pub const CACHE_FILE: &str = "cache.json";
pub const STATS_FILE: &str = "usage-stats.json";
pub const SETTINGS_FILE: &str = "config.toml";
pub const DEBUG_LOG_FILE: &str = "ccswitch-debug.log";
pub const BACKUP_DIR: &str = "backups";

pub const DEFAULT_TIMEOUT_MS: u32 = 8000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_LAUNCH_COMMAND: &str = "claude";

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_ms: DEFAULT_BACKOFF_MS,
            exhaustive: false,
            capabilities: default_capability_probes(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_LAUNCH_COMMAND.to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            probe: ProbeSettings::default(),
            cache: CacheSettings::default(),
            launch: LaunchSettings::default(),
        }
    }
}
