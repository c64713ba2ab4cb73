//! Hands the selected profile to the external program.
//!
//! The activated endpoint and credential are passed to the child process
//! through its own environment; the current process environment is never
//! modified.

use crate::core::selector::SelectedProfile;
use crate::profiles::CREDENTIAL_VISIBLE_CHARS;
use std::io::ErrorKind;
use std::process::{Command, ExitStatus};
use thiserror::Error;

pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";
pub const AUTH_TOKEN_ENV: &str = "ANTHROPIC_AUTH_TOKEN";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("command '{0}' was not found in PATH")]
    NotFound(String),
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Connection details exported to the launched program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedProfile {
    pub name: String,
    pub base_url: String,
    pub credential: String,
}

impl From<&SelectedProfile> for ActivatedProfile {
    fn from(selected: &SelectedProfile) -> Self {
        Self {
            name: selected.profile.name.clone(),
            base_url: selected.profile.base_url.clone(),
            credential: selected.profile.credential.clone(),
        }
    }
}

impl ActivatedProfile {
    pub fn env_vars(&self) -> [(&'static str, &str); 2] {
        [
            (BASE_URL_ENV, self.base_url.as_str()),
            (AUTH_TOKEN_ENV, self.credential.as_str()),
        ]
    }

    /// Variables as displayed to the user, credential truncated
    pub fn masked_env_lines(&self) -> Vec<String> {
        let visible: String = self
            .credential
            .chars()
            .take(CREDENTIAL_VISIBLE_CHARS)
            .collect();
        vec![
            format!("{}={}", BASE_URL_ENV, self.base_url),
            format!("{}={}...", AUTH_TOKEN_ENV, visible),
        ]
    }

    /// Commands that set the variables in the user's shell
    pub fn shell_exports(&self) -> Vec<String> {
        if cfg!(windows) {
            self.env_vars()
                .iter()
                .map(|(key, value)| format!("$env:{}=\"{}\"", key, value))
                .collect()
        } else {
            self.env_vars()
                .iter()
                .map(|(key, value)| format!("export {}=\"{}\"", key, value))
                .collect()
        }
    }
}

pub struct Launcher {
    command: String,
}

impl Launcher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Build the child command with the profile's variables set
    pub fn build_command(&self, profile: &ActivatedProfile) -> Command {
        let mut command = Command::new(&self.command);
        for (key, value) in profile.env_vars() {
            command.env(key, value);
        }
        command
    }

    /// Run the program with inherited stdio and wait for it
    pub fn launch(&self, profile: &ActivatedProfile) -> Result<ExitStatus, LaunchError> {
        self.build_command(profile)
            .status()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => LaunchError::NotFound(self.command.clone()),
                _ => LaunchError::Spawn {
                    command: self.command.clone(),
                    source,
                },
            })
    }
}
