/*!
Provider availability probing.

The Prober decides whether one profile's endpoint is reachable and which
capability probes (model families) it accepts. Each capability probe is a
minimal authenticated `POST {base_url}/v1/messages`; only the status code of
the response is consulted.

## Status interpretation

- **2xx**: capability supported, endpoint available
- **400 / 401 / 403 / 422 / 429**: endpoint available, capability restricted
- **anything else / transport failure**: inconclusive, retried after a backoff

Every network or protocol failure ends up inside the returned [`Verdict`];
only a malformed profile is reported as an error.
*/

use crate::core::network::debug_logger::get_debug_logger;
use crate::core::network::types::*;
use crate::profiles::Profile;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[cfg(feature = "network-monitoring")]
use isahc::config::Configurable;
#[cfg(feature = "network-monitoring")]
use isahc::{AsyncReadResponseExt, HttpClient, Request};

/// Classified transport-level failure of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The per-attempt deadline elapsed
    Timeout,
    NameResolution(String),
    ConnectionRefused(String),
    ConnectTimeout(String),
    Other(String),
}

impl TransportError {
    /// Fixed human-readable reason stored in the verdict
    pub fn reason(&self, timeout_ms: u32) -> String {
        match self {
            TransportError::Timeout => {
                if timeout_ms % 1000 == 0 {
                    format!("Timeout ({}s)", timeout_ms / 1000)
                } else {
                    format!("Timeout ({}ms)", timeout_ms)
                }
            }
            TransportError::NameResolution(_) => "DNS resolution failed".to_string(),
            TransportError::ConnectionRefused(_) => "connection refused".to_string(),
            TransportError::ConnectTimeout(_) => "connection timed out".to_string(),
            TransportError::Other(msg) => msg.clone(),
        }
    }

    /// Classify a raw transport error message
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("refused") {
            TransportError::ConnectionRefused(message.to_string())
        } else if lower.contains("enotfound")
            || lower.contains("could not resolve")
            || lower.contains("name resolution")
            || lower.contains("dns")
        {
            TransportError::NameResolution(message.to_string())
        } else if lower.contains("timed out") || lower.contains("etimedout") {
            TransportError::ConnectTimeout(message.to_string())
        } else {
            TransportError::Other(message.to_string())
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::NameResolution(msg)
            | TransportError::ConnectionRefused(msg)
            | TransportError::ConnectTimeout(msg)
            | TransportError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// HTTP client abstraction for dependency injection and testing
#[async_trait::async_trait]
pub trait HttpClientTrait: Send + Sync {
    /// Execute a POST request and return (status_code, duration)
    async fn execute_request(
        &self,
        url: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
        timeout_ms: u32,
    ) -> Result<(u16, Duration), TransportError>;
}

/// Production HTTP client implementation using isahc
#[cfg(feature = "network-monitoring")]
pub struct IsahcHttpClient {
    client: HttpClient,
}

#[cfg(feature = "network-monitoring")]
#[async_trait::async_trait]
impl HttpClientTrait for IsahcHttpClient {
    async fn execute_request(
        &self,
        url: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
        timeout_ms: u32,
    ) -> Result<(u16, Duration), TransportError> {
        let start = Instant::now();

        let mut request = Request::post(&url)
            .timeout(Duration::from_millis(timeout_ms as u64))
            .body(body)
            .map_err(|e| TransportError::Other(format!("Request creation failed: {}", e)))?;

        for (key, value) in headers {
            let header_name = key
                .parse::<isahc::http::header::HeaderName>()
                .map_err(|e| TransportError::Other(format!("Invalid header name: {}", e)))?;
            let header_value = value
                .parse::<isahc::http::header::HeaderValue>()
                .map_err(|e| TransportError::Other(format!("Invalid header value: {}", e)))?;
            request.headers_mut().insert(header_name, header_value);
        }

        let mut response = self
            .client
            .send_async(request)
            .await
            .map_err(classify_isahc_error)?;
        let duration = start.elapsed();
        let status = response.status().as_u16();

        // Drain the body so the connection can be reused; its content is ignored
        let _ = response.consume().await;

        Ok((status, duration))
    }
}

#[cfg(feature = "network-monitoring")]
fn classify_isahc_error(error: isahc::Error) -> TransportError {
    use isahc::error::ErrorKind;

    match error.kind() {
        ErrorKind::Timeout => TransportError::Timeout,
        ErrorKind::NameResolution => TransportError::NameResolution(error.to_string()),
        _ => TransportError::from_message(&error.to_string()),
    }
}

#[cfg(feature = "network-monitoring")]
impl IsahcHttpClient {
    pub fn new() -> Result<Self, NetworkError> {
        let client = HttpClient::new()
            .map_err(|e| NetworkError::HttpError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Stand-in client when the crate is built without network support
#[cfg(not(feature = "network-monitoring"))]
#[derive(Default)]
pub struct OfflineHttpClient;

#[cfg(not(feature = "network-monitoring"))]
#[async_trait::async_trait]
impl HttpClientTrait for OfflineHttpClient {
    async fn execute_request(
        &self,
        _url: String,
        _headers: HashMap<String, String>,
        _body: Vec<u8>,
        _timeout_ms: u32,
    ) -> Result<(u16, Duration), TransportError> {
        Err(TransportError::Other(
            "network probing is disabled in this build".to_string(),
        ))
    }
}

/// How a single HTTP status is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx: the capability works
    Supported,
    /// Reachable, but the capability is unsupported or restricted
    Restricted(&'static str),
    /// Not conclusive, worth retrying
    Inconclusive,
}

/// Map an HTTP status to its interpretation
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Supported,
        401 => StatusClass::Restricted("authentication failed, check the API key"),
        403 => StatusClass::Restricted("permission denied, check the API key scopes"),
        429 => StatusClass::Restricted("rate limited, service reachable"),
        400 => StatusClass::Restricted("bad request, model probably unsupported"),
        422 => StatusClass::Restricted("model not supported"),
        _ => StatusClass::Inconclusive,
    }
}

/// Tunables for one Prober
#[derive(Debug, Clone)]
pub struct ProberOptions {
    /// Extra attempts per capability probe after the first one
    pub max_retries: u32,
    /// Hard deadline for one attempt
    pub timeout_ms: u32,
    /// Wait between inconclusive attempts
    pub backoff: Duration,
    /// Keep probing remaining capabilities after a 2xx
    pub exhaustive: bool,
    /// Ordered probe set
    pub capabilities: Vec<CapabilityProbe>,
}

impl Default for ProberOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeout_ms: 8000,
            backoff: Duration::from_millis(1000),
            exhaustive: false,
            capabilities: default_capability_probes(),
        }
    }
}

/// Failure recorded for a capability probe that never got a recognized status
#[derive(Debug, Clone)]
struct AttemptFailure {
    status: Option<u16>,
    latency_ms: Option<u64>,
    reason: String,
}

enum AttemptOutcome {
    Supported { status: u16, latency_ms: u64 },
    Restricted { status: u16, latency_ms: u64, reason: &'static str },
    Failed(AttemptFailure),
}

/// Availability checker for a single profile
pub struct Prober {
    http_client: Box<dyn HttpClientTrait>,
    options: ProberOptions,
    verbose: bool,
}

impl Prober {
    /// Create a Prober backed by the production HTTP client
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::HttpError` if the HTTP client cannot be created.
    pub fn new(options: ProberOptions) -> Result<Self, NetworkError> {
        #[cfg(feature = "network-monitoring")]
        let http_client: Box<dyn HttpClientTrait> = Box::new(IsahcHttpClient::new()?);
        #[cfg(not(feature = "network-monitoring"))]
        let http_client: Box<dyn HttpClientTrait> = Box::new(OfflineHttpClient);

        Ok(Self {
            http_client,
            options,
            verbose: false,
        })
    }

    /// Create a Prober around an injected client (for testing)
    pub fn with_client(client: Box<dyn HttpClientTrait>, options: ProberOptions) -> Self {
        Self {
            http_client: client,
            options,
            verbose: false,
        }
    }

    /// Print per-attempt diagnostics to stdout
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Probe one profile and fold every outcome into a verdict
    ///
    /// Capability probes run strictly in the configured order. Within a probe,
    /// inconclusive attempts are retried up to `max_retries` times with a fixed
    /// backoff; a recognized status ends that probe immediately. A 2xx also ends
    /// the whole profile unless `exhaustive` is set.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::InvalidProfile` when the base URL or credential is
    /// unusable. Network failures never produce an error.
    pub async fn probe(&self, profile: &Profile) -> Result<Verdict, NetworkError> {
        let endpoint = Self::messages_url(profile)?;
        if profile.credential.trim().is_empty() {
            return Err(NetworkError::InvalidProfile(format!(
                "profile '{}' has an empty credential",
                profile.name
            )));
        }

        let logger = get_debug_logger();
        let probe_id = format!("probe_{}", uuid::Uuid::new_v4());
        let probe_start = Instant::now();
        logger.probe_start(
            &profile.name,
            self.options.timeout_ms as u64,
            probe_id.clone(),
        );

        let mut supported: Vec<String> = Vec::new();
        let mut best: Option<Verdict> = None;
        let mut failures: Vec<AttemptFailure> = Vec::new();

        'capabilities: for capability in &self.options.capabilities {
            self.say(format!(
                "    🔍 Testing {} model: {}",
                capability.label, capability.model
            ));
            let body = Self::build_payload(&capability.model)?;
            let mut last_failure: Option<AttemptFailure> = None;

            for attempt in 0..=self.options.max_retries {
                self.say(format!(
                    "    🌐 POST {} ({}, attempt {}/{})",
                    endpoint,
                    capability.label,
                    attempt + 1,
                    self.options.max_retries + 1
                ));

                match self.attempt(&endpoint, profile, &body).await {
                    AttemptOutcome::Supported { status, latency_ms } => {
                        logger.probe_attempt(
                            &capability.label,
                            attempt,
                            Some(status),
                            "supported",
                            probe_id.clone(),
                        );
                        self.say(format!(
                            "    ✅ {} supported ({}ms)",
                            capability.label, latency_ms
                        ));
                        supported.push(capability.label.clone());

                        // The first full success stays the deciding verdict
                        if !best.as_ref().is_some_and(Verdict::is_full_success) {
                            best = Some(Verdict {
                                available: true,
                                status_code: Some(status),
                                probed_endpoint: capability.endpoint_id(),
                                latency_ms: Some(latency_ms),
                                capabilities: Vec::new(),
                                error_message: None,
                            });
                        }

                        if self.options.exhaustive {
                            continue 'capabilities;
                        }
                        break 'capabilities;
                    }
                    AttemptOutcome::Restricted {
                        status,
                        latency_ms,
                        reason,
                    } => {
                        logger.probe_attempt(
                            &capability.label,
                            attempt,
                            Some(status),
                            "restricted",
                            probe_id.clone(),
                        );
                        self.say(format!(
                            "    ❌ {} not supported ({})",
                            capability.label, status
                        ));

                        // First restricted verdict wins among non-successes
                        if best.is_none() {
                            best = Some(Verdict {
                                available: true,
                                status_code: Some(status),
                                probed_endpoint: capability.endpoint_id(),
                                latency_ms: Some(latency_ms),
                                capabilities: Vec::new(),
                                error_message: Some(reason.to_string()),
                            });
                        }
                        continue 'capabilities;
                    }
                    AttemptOutcome::Failed(failure) => {
                        logger.probe_attempt(
                            &capability.label,
                            attempt,
                            failure.status,
                            &failure.reason,
                            probe_id.clone(),
                        );
                        self.say(format!("    ❌ Request failed: {}", failure.reason));
                        last_failure = Some(failure);

                        if attempt < self.options.max_retries {
                            self.say(format!(
                                "    ⏳ Retrying in {}ms...",
                                self.options.backoff.as_millis()
                            ));
                            tokio::time::sleep(self.options.backoff).await;
                        }
                    }
                }
            }

            if let Some(failure) = last_failure {
                failures.push(failure);
            }
        }

        let verdict = match best {
            Some(mut verdict) => {
                verdict.capabilities = supported;
                verdict
            }
            None => Self::aggregate_failures(&failures),
        };

        logger.probe_end(
            verdict.available,
            verdict.status_code,
            probe_start.elapsed().as_millis() as u64,
            probe_id,
        );

        Ok(verdict)
    }

    /// Run a single attempt under the per-attempt deadline
    async fn attempt(&self, url: &str, profile: &Profile, body: &[u8]) -> AttemptOutcome {
        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", profile.credential),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert(
            "User-Agent".to_string(),
            format!("ccswitch/{}", env!("CARGO_PKG_VERSION")),
        );

        let timeout_ms = self.options.timeout_ms;
        let request = self.http_client.execute_request(
            url.to_string(),
            headers,
            body.to_vec(),
            timeout_ms,
        );

        let deadline = Duration::from_millis(timeout_ms as u64);
        let result = match tokio::time::timeout(deadline, request).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        match result {
            Ok((status, duration)) => {
                let latency_ms = duration.as_millis() as u64;
                match classify_status(status) {
                    StatusClass::Supported => AttemptOutcome::Supported { status, latency_ms },
                    StatusClass::Restricted(reason) => AttemptOutcome::Restricted {
                        status,
                        latency_ms,
                        reason,
                    },
                    StatusClass::Inconclusive => AttemptOutcome::Failed(AttemptFailure {
                        status: Some(status),
                        latency_ms: Some(latency_ms),
                        reason: format!("HTTP {}", status),
                    }),
                }
            }
            Err(err) => AttemptOutcome::Failed(AttemptFailure {
                status: None,
                latency_ms: None,
                reason: err.reason(timeout_ms),
            }),
        }
    }

    /// Build the unavailable verdict once no probe proved reachability
    fn aggregate_failures(failures: &[AttemptFailure]) -> Verdict {
        let Some(last) = failures.last() else {
            return Verdict::unavailable(None, ALL_PROBES_FAILED_MESSAGE);
        };

        let reason = if failures.iter().all(|f| f.reason == last.reason) {
            last.reason.clone()
        } else {
            ALL_PROBES_FAILED_MESSAGE.to_string()
        };

        let mut verdict = Verdict::unavailable(last.status, reason);
        verdict.latency_ms = last.latency_ms;
        verdict
    }

    fn messages_url(profile: &Profile) -> Result<String, NetworkError> {
        let base = profile.base_url.trim();
        if base.is_empty() {
            return Err(NetworkError::InvalidProfile(format!(
                "profile '{}' has no base URL",
                profile.name
            )));
        }

        let parsed = url::Url::parse(base).map_err(|e| {
            NetworkError::InvalidProfile(format!("profile '{}': {}", profile.name, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(NetworkError::InvalidProfile(format!(
                "profile '{}' must use http or https",
                profile.name
            )));
        }

        Ok(format!("{}{}", base.trim_end_matches('/'), MESSAGES_PATH))
    }

    fn build_payload(model: &str) -> Result<Vec<u8>, NetworkError> {
        let payload = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "user", "content": "test"}
            ],
            "max_tokens": 1
        });

        serde_json::to_vec(&payload)
            .map_err(|e| NetworkError::HttpError(format!("Payload serialization failed: {}", e)))
    }

    fn say(&self, line: String) {
        if self.verbose {
            println!("{}", line);
        }
    }
}
