use super::defaults::*;
use crate::core::network::prober::ProberOptions;
use crate::core::network::types::CapabilityProbe;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("home directory not found")]
    HomeDirNotFound,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Locations of every file ccswitch owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub providers: PathBuf,
    pub cache: PathBuf,
    pub stats: PathBuf,
    pub backups: PathBuf,
    pub settings: PathBuf,
    pub debug_log: PathBuf,
}

impl Paths {
    /// `$CCSWITCH_HOME` if set, otherwise `~/.switch-claude`
    pub fn resolve() -> Result<Self, ConfigError> {
        if let Ok(root) = env::var(HOME_ENV) {
            if !root.trim().is_empty() {
                return Ok(Self::at(root));
            }
        }

        let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
        Ok(Self::at(home.join(APP_DIR_NAME)))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            providers: root.join(PROVIDERS_FILE),
            cache: root.join(CACHE_FILE),
            stats: root.join(STATS_FILE),
            backups: root.join(BACKUP_DIR),
            settings: root.join(SETTINGS_FILE),
            debug_log: root.join(DEBUG_LOG_FILE),
            root,
        }
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.backups)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub timeout_ms: u32,
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Keep probing after the first supported capability
    pub exhaustive: bool,
    pub capabilities: Vec<CapabilityProbe>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Program started after a profile is activated
    pub command: String,
}

/// Contents of config.toml; every section is optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub probe: ProbeSettings,
    pub cache: CacheSettings,
    pub launch: LaunchSettings,
}

impl Settings {
    /// Read config.toml if present, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&content).map_err(|message| ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            })?
        } else {
            Self::default()
        };

        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = parse_env::<u32>(TIMEOUT_ENV)? {
            self.probe.timeout_ms = value;
        }
        if let Some(value) = parse_env::<u32>(MAX_RETRIES_ENV)? {
            self.probe.max_retries = value;
        }
        if let Some(value) = parse_env::<u64>(CACHE_TTL_ENV)? {
            self.cache.ttl_secs = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.probe.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "probe.timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.probe.capabilities.is_empty() {
            return Err(ConfigError::Invalid {
                key: "probe.capabilities".to_string(),
                message: "at least one capability probe is required".to_string(),
            });
        }
        if let Some(probe) = self
            .probe
            .capabilities
            .iter()
            .find(|c| c.label.trim().is_empty() || c.model.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                key: "probe.capabilities".to_string(),
                message: format!("label and model must be non-empty (got {:?})", probe),
            });
        }
        if self.launch.command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "launch.command".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn prober_options(&self) -> ProberOptions {
        ProberOptions {
            max_retries: self.probe.max_retries,
            timeout_ms: self.probe.timeout_ms,
            backoff: Duration::from_millis(self.probe.backoff_ms),
            exhaustive: self.probe.exhaustive,
            capabilities: self.probe.capabilities.clone(),
        }
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
            }),
        _ => Ok(None),
    }
}
