//! Provider profiles and their on-disk store (`providers.json`).
//!
//! The store also owns backups, export and import of the profile list. The
//! probing engine only ever reads the `Vec<Profile>` this module loads.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Shortest credential accepted as plausibly complete
pub const MIN_CREDENTIAL_LEN: usize = 10;
/// Leading credential characters that may be shown to the user
pub const CREDENTIAL_VISIBLE_CHARS: usize = 12;
pub const MAX_NAME_LEN: usize = 50;
/// Number of backup files kept after each backup
pub const MAX_BACKUPS: usize = 10;
pub const EXPORT_FORMAT_VERSION: &str = "1.0.0";

const EXAMPLE_KEY_MARKERS: [&str; 3] = [
    "sk-your-api-key-here",
    "cr_your-api-key-here",
    "custom_your-api-key-here",
];

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("profile validation failed:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
    #[error("import file has no providers array")]
    InvalidImport,
    #[error("index must be a number")]
    IndexNotNumeric,
    #[error("index must be between 1 and {max}")]
    IndexOutOfRange { max: usize },
}

/// A named endpoint plus credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "key")]
    pub credential: String,
    #[serde(rename = "default", default)]
    pub is_default: bool,
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            credential: credential.into(),
            is_default: false,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Credential with everything past the visible prefix masked
    pub fn masked_credential(&self) -> String {
        mask_secret(&self.credential, CREDENTIAL_VISIBLE_CHARS)
    }
}

/// Keep `visible` leading characters and replace the rest with `*`
pub fn mask_secret(secret: &str, visible: usize) -> String {
    let total = secret.chars().count();
    if total <= visible {
        return "*".repeat(total);
    }
    let prefix: String = secret.chars().take(visible).collect();
    format!("{}{}", prefix, "*".repeat(total - visible))
}

pub fn validate_url(url: &str) -> Result<(), String> {
    if url.trim().is_empty() {
        return Err("URL must not be empty".to_string());
    }
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(_) => Err("URL must use http or https".to_string()),
        Err(_) => Err("URL is not valid".to_string()),
    }
}

pub fn validate_credential(key: &str) -> Result<(), String> {
    if key.trim().is_empty() {
        return Err("API key must not be empty".to_string());
    }
    if key.chars().count() < MIN_CREDENTIAL_LEN {
        return Err("API key is too short".to_string());
    }
    if EXAMPLE_KEY_MARKERS.iter().any(|marker| key.contains(marker)) {
        return Err("replace the example API key with a real one".to_string());
    }
    Ok(())
}

pub fn validate_name(name: &str, existing: &[String]) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("provider name must not be empty".to_string());
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(format!("provider name must be at most {} characters", MAX_NAME_LEN));
    }
    if existing.iter().any(|n| n == trimmed) {
        return Err("provider name already exists".to_string());
    }
    Ok(())
}

/// Collect every problem in a profile list, positions are zero-based
pub fn validate_profiles(profiles: &[Profile]) -> Vec<String> {
    if profiles.is_empty() {
        return vec!["no providers configured, at least one is required".to_string()];
    }

    let mut errors = Vec::new();
    let mut names = HashSet::new();

    for (index, profile) in profiles.iter().enumerate() {
        if profile.name.trim().is_empty() {
            errors.push(format!("Provider [{}]: missing name", index));
        } else if !names.insert(profile.name.as_str()) {
            errors.push(format!(
                "Provider [{}]: name \"{}\" is duplicated",
                index, profile.name
            ));
        }

        if let Err(e) = validate_url(&profile.base_url) {
            errors.push(format!("Provider [{}]: baseUrl: {}", index, e));
        }

        if profile.credential.trim().is_empty() {
            errors.push(format!("Provider [{}]: missing key", index));
        } else if profile.credential.chars().count() < MIN_CREDENTIAL_LEN {
            errors.push(format!(
                "Provider [{}]: key is too short, check that it is complete",
                index
            ));
        }
    }

    errors
}

/// Parse a 1-based index and return it zero-based
pub fn parse_index(raw: &str, len: usize) -> Result<usize, ProfileError> {
    let value: usize = raw.trim().parse().map_err(|_| ProfileError::IndexNotNumeric)?;
    check_index(value, len)
}

pub fn check_index(value: usize, len: usize) -> Result<usize, ProfileError> {
    if value < 1 || value > len {
        return Err(ProfileError::IndexOutOfRange { max: len });
    }
    Ok(value - 1)
}

/// True when the list still contains placeholder endpoints or keys
pub fn is_example(profiles: &[Profile]) -> bool {
    profiles
        .iter()
        .any(|p| p.base_url.contains("example") || p.credential.contains("your-api-key-here"))
}

pub fn example_profiles() -> Vec<Profile> {
    vec![
        Profile::new(
            "Provider1",
            "https://api.example1.com",
            "sk-your-api-key-here-replace-with-real-key",
        )
        .with_default(true),
        Profile::new(
            "Provider2",
            "https://api.example2.com",
            "cr_your-api-key-here-replace-with-real-key",
        ),
    ]
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub export_time: String,
    pub providers: Vec<Profile>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    pub backup_time: String,
    pub provider_count: usize,
    pub providers: Vec<Profile>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    Bare(Vec<Profile>),
    Export { providers: Vec<Profile> },
}

/// File name friendly UTC timestamp, e.g. 2025-01-31T10-15-00
fn file_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string()
}

fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct ProfileStore {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load and validate the profile list
    pub fn load(&self) -> Result<Vec<Profile>, ProfileError> {
        let profiles = self.load_unchecked()?;
        let errors = validate_profiles(&profiles);
        if !errors.is_empty() {
            return Err(ProfileError::Invalid(errors));
        }
        Ok(profiles)
    }

    /// Load without validation; a missing file is an empty list
    fn load_unchecked(&self) -> Result<Vec<Profile>, ProfileError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_json(&self.path)
    }

    /// Validate then replace the file atomically
    pub fn save(&self, profiles: &[Profile]) -> Result<(), ProfileError> {
        let errors = validate_profiles(profiles);
        if !errors.is_empty() {
            return Err(ProfileError::Invalid(errors));
        }
        write_json_atomic(&self.path, &profiles)
    }

    pub fn create_example(&self) -> Result<(), ProfileError> {
        self.save(&example_profiles())
    }

    /// Append a profile; a new default clears every other default
    pub fn add(&self, profile: Profile) -> Result<Vec<Profile>, ProfileError> {
        let mut profiles = self.load_unchecked()?;
        if profile.is_default {
            profiles.iter_mut().for_each(|p| p.is_default = false);
        }
        profiles.push(profile);
        self.save(&profiles)?;
        Ok(profiles)
    }

    /// Remove the profile at a zero-based index, returning it
    pub fn remove(&self, index: usize) -> Result<Profile, ProfileError> {
        let mut profiles = self.load()?;
        check_index(index + 1, profiles.len())?;
        if profiles.len() == 1 {
            return Err(ProfileError::Invalid(vec![
                "cannot remove the last provider".to_string(),
            ]));
        }
        let removed = profiles.remove(index);
        self.save(&profiles)?;
        Ok(removed)
    }

    /// Make the profile at a zero-based index the only default
    pub fn set_default(&self, index: usize) -> Result<Profile, ProfileError> {
        let mut profiles = self.load()?;
        check_index(index + 1, profiles.len())?;
        for (i, profile) in profiles.iter_mut().enumerate() {
            profile.is_default = i == index;
        }
        self.save(&profiles)?;
        Ok(profiles[index].clone())
    }

    pub fn clear_default(&self) -> Result<(), ProfileError> {
        let mut profiles = self.load()?;
        profiles.iter_mut().for_each(|p| p.is_default = false);
        self.save(&profiles)
    }

    /// Write a timestamped backup and prune all but the newest ones
    pub fn backup(&self, profiles: &[Profile]) -> Result<PathBuf, ProfileError> {
        fs::create_dir_all(&self.backup_dir).map_err(|source| ProfileError::Io {
            path: self.backup_dir.clone(),
            source,
        })?;

        let mut file = self.backup_dir.join(format!("backup-{}.json", file_timestamp()));
        let mut suffix = 1;
        while file.exists() {
            file = self
                .backup_dir
                .join(format!("backup-{}-{}.json", file_timestamp(), suffix));
            suffix += 1;
        }

        let document = BackupDocument {
            version: EXPORT_FORMAT_VERSION.to_string(),
            backup_time: iso_now(),
            provider_count: profiles.len(),
            providers: profiles.to_vec(),
        };
        write_json_atomic(&file, &document)?;
        self.prune_backups()?;
        Ok(file)
    }

    /// Backup files, newest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, ProfileError> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.backup_dir).map_err(|source| ProfileError::Io {
            path: self.backup_dir.clone(),
            source,
        })?;

        let mut backups: Vec<(std::time::SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("backup-") && n.ends_with(".json"))
            })
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(std::time::UNIX_EPOCH);
                (modified, path)
            })
            .collect();

        // Names embed the timestamp, so they break mtime ties
        backups.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }

    fn prune_backups(&self) -> Result<(), ProfileError> {
        for stale in self.list_backups()?.into_iter().skip(MAX_BACKUPS) {
            let _ = fs::remove_file(stale);
        }
        Ok(())
    }

    /// Export to `output` or to a timestamped file in the working directory
    pub fn export(
        &self,
        profiles: &[Profile],
        output: Option<&Path>,
    ) -> Result<PathBuf, ProfileError> {
        let path = match output {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(format!(
                "switch-claude-backup-{}.json",
                file_timestamp()
            )),
        };

        let document = ExportDocument {
            version: EXPORT_FORMAT_VERSION.to_string(),
            export_time: iso_now(),
            providers: profiles.to_vec(),
        };
        write_json_atomic(&path, &document)?;
        Ok(fs::canonicalize(&path).unwrap_or(path))
    }

    /// Import profiles from a bare array or an export document
    ///
    /// Merge keeps existing profiles and appends those with new names. Replace
    /// backs up the current list first. Returns the resulting profile count.
    pub fn import(&self, input: &Path, merge: bool) -> Result<usize, ProfileError> {
        let incoming = match read_json::<ImportDocument>(input) {
            Ok(ImportDocument::Bare(profiles))
            | Ok(ImportDocument::Export {
                providers: profiles,
            }) => profiles,
            Err(ProfileError::Parse { .. }) => return Err(ProfileError::InvalidImport),
            Err(e) => return Err(e),
        };

        let existing = self.load_unchecked()?;
        let profiles = if merge {
            let names: HashSet<&str> = existing.iter().map(|p| p.name.as_str()).collect();
            let mut merged = existing.clone();
            merged.extend(
                incoming
                    .into_iter()
                    .filter(|p| !names.contains(p.name.as_str())),
            );
            merged
        } else {
            if !existing.is_empty() {
                self.backup(&existing)?;
            }
            incoming
        };

        self.save(&profiles)?;
        Ok(profiles.len())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProfileError> {
    let content = fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| ProfileError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ProfileError> {
    let io_err = |source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_string_pretty(value).map_err(|e| ProfileError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json).map_err(io_err)?;
    fs::rename(&temp_path, path).map_err(io_err)
}
