// Core types for provider availability probing
use crate::profiles::Profile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API path every capability probe is sent to
pub const MESSAGES_PATH: &str = "/v1/messages";

/// `probed_endpoint` sentinel for verdicts where no probe produced an answer
pub const ALL_PROBES_FAILED: &str = "all-probes-failed";

/// Generic aggregate reason when probes failed for different reasons
pub const ALL_PROBES_FAILED_MESSAGE: &str = "all capability probes failed";

/// Reason attached to the synthetic verdict used when a batch lost a result
pub const RESULT_MISSING_MESSAGE: &str = "result missing";

/// Fingerprint → Verdict map persisted by the result cache
pub type VerdictMap = BTreeMap<String, Verdict>;

/// One fixed synthetic request representing an upstream API family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProbe {
    /// Short label reported in `Verdict::capabilities` (e.g. "Claude")
    pub label: String,
    /// Model identifier sent in the probe payload
    pub model: String,
}

impl CapabilityProbe {
    pub fn new(label: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            model: model.into(),
        }
    }

    /// Identifier written to `Verdict::probed_endpoint`
    pub fn endpoint_id(&self) -> String {
        format!("{}:{}", self.label, MESSAGES_PATH)
    }
}

/// Default probe set: one Anthropic-style model and one OpenAI-style model
pub fn default_capability_probes() -> Vec<CapabilityProbe> {
    vec![
        CapabilityProbe::new("Claude", "claude-sonnet-4-20250514"),
        CapabilityProbe::new("GPT", "gpt-5"),
    ]
}

/// Outcome of probing one profile
///
/// Verdicts are value objects: once produced they are cloned into the cache
/// and into selection results, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Whether the endpoint answered with a status proving it is reachable
    pub available: bool,
    /// HTTP status of the deciding response, None when nothing answered
    pub status_code: Option<u16>,
    /// Which capability probe produced the verdict, or `ALL_PROBES_FAILED`
    pub probed_endpoint: String,
    /// Response latency, only set when a response was received
    pub latency_ms: Option<u64>,
    /// Labels of every capability probe that returned a 2xx
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Human readable reason; None only for a clean success
    pub error_message: Option<String>,
}

impl Verdict {
    /// Verdict for an endpoint that could not be shown reachable
    pub fn unavailable(status_code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            available: false,
            status_code,
            probed_endpoint: ALL_PROBES_FAILED.to_string(),
            latency_ms: None,
            capabilities: Vec::new(),
            error_message: Some(reason.into()),
        }
    }

    /// Synthetic verdict substituted when a batch result went missing
    pub fn missing() -> Self {
        Self::unavailable(None, RESULT_MISSING_MESSAGE)
    }

    /// True when the deciding response was a 2xx
    pub fn is_full_success(&self) -> bool {
        self.available && matches!(self.status_code, Some(200..=299))
    }
}

/// On-disk cache document: one timestamp for the whole map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStore {
    /// Epoch milliseconds of the last successful save
    pub timestamp: i64,
    /// Verdicts keyed by fingerprint
    #[serde(default)]
    pub results: VerdictMap,
}

/// One profile's result after a batch run
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Zero-based position in the input profile list
    pub index: usize,
    pub profile: Profile,
    pub verdict: Verdict,
    /// Whether the verdict was reused from the result cache
    pub from_cache: bool,
}

impl ProbeReport {
    /// 1-based index shown to the user
    pub fn display_index(&self) -> usize {
        self.index + 1
    }
}

/// Probing engine errors
#[derive(Debug)]
pub enum NetworkError {
    HomeDirNotFound,
    InvalidProfile(String),
    HttpError(String),
    CacheFileError(String),
    ConfigReadError(String),
    ConfigParseError(String),
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::HomeDirNotFound => write!(f, "Home directory not found"),
            NetworkError::InvalidProfile(msg) => write!(f, "Invalid profile: {}", msg),
            NetworkError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            NetworkError::CacheFileError(msg) => write!(f, "Cache file error: {}", msg),
            NetworkError::ConfigReadError(msg) => write!(f, "Config read error: {}", msg),
            NetworkError::ConfigParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<std::io::Error> for NetworkError {
    fn from(error: std::io::Error) -> Self {
        NetworkError::ConfigReadError(error.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(error: serde_json::Error) -> Self {
        NetworkError::ConfigParseError(error.to_string())
    }
}
