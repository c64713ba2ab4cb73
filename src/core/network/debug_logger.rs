use std::collections::HashMap;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use flate2::{write::GzEncoder, Compression};
use fs2::FileExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::Paths;

const DEBUG_ENV: &str = "CCSWITCH_DEBUG";
const LOG_FILE_NAME: &str = "ccswitch-debug.log";
const LOG_ROTATION_SIZE_MB: u64 = 8;
const MAX_ARCHIVES: usize = 5;
const ROTATION_CHECK_INTERVAL: u32 = 200;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,              // ISO-8601 with timezone
    pub level: String,                  // DEBUG, WARN, ERROR, NETWORK, CACHE, SELECT
    pub component: String,
    pub event: String,
    pub message: String,                // redacted
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, Value>,
}

struct RotatingLogger {
    log_path: PathBuf,
    write_count: AtomicU32,
}

impl RotatingLogger {
    fn new(log_path: PathBuf) -> Self {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        Self {
            log_path,
            write_count: AtomicU32::new(0),
        }
    }

    fn write_with_rotation(&self, json_line: &str) -> Result<(), std::io::Error> {
        if self.write_count.fetch_add(1, Ordering::Relaxed) % ROTATION_CHECK_INTERVAL == 0 {
            let _ = self.rotate_if_needed();
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        writeln!(file, "{}", json_line)?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<(), std::io::Error> {
        if !self.needs_rotation()? {
            return Ok(());
        }

        // Another ccswitch process may be rotating the same file
        let lock_path = self.log_path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_ok() {
            if self.needs_rotation()? {
                self.perform_rotation()?;
            }
            let _ = lock_file.unlock();
            let _ = std::fs::remove_file(&lock_path);
        }
        Ok(())
    }

    fn needs_rotation(&self) -> Result<bool, std::io::Error> {
        if !self.log_path.exists() {
            return Ok(false);
        }

        let metadata = std::fs::metadata(&self.log_path)?;
        Ok(metadata.len() >= LOG_ROTATION_SIZE_MB * 1024 * 1024)
    }

    fn base_name(&self) -> String {
        self.log_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "ccswitch-debug".to_string())
    }

    fn log_dir(&self) -> PathBuf {
        self.log_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn perform_rotation(&self) -> Result<(), std::io::Error> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let archive_path = self
            .log_dir()
            .join(format!("{}.{}.gz", self.base_name(), timestamp));

        let temp_path = self.log_path.with_extension("rotating");
        std::fs::rename(&self.log_path, &temp_path)?;

        let source_file = File::open(&temp_path)?;
        let target_file = File::create(&archive_path)?;
        let mut encoder = GzEncoder::new(target_file, Compression::default());
        std::io::copy(&mut BufReader::new(source_file), &mut encoder)?;
        encoder.finish()?;

        std::fs::remove_file(&temp_path)?;
        let _ = self.cleanup_old_archives();

        Ok(())
    }

    fn cleanup_old_archives(&self) -> Result<(), std::io::Error> {
        let prefix = format!("{}.", self.base_name());

        let mut archives = Vec::new();
        for entry in std::fs::read_dir(self.log_dir())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();

            if name.starts_with(&prefix) && name.ends_with(".gz") {
                archives.push((entry.path(), entry.metadata()?.modified()?));
            }
        }

        archives.sort_by_key(|(_, modified)| *modified);
        if archives.len() > MAX_ARCHIVES {
            let to_remove = archives.len() - MAX_ARCHIVES;
            for (path, _) in archives.iter().take(to_remove) {
                let _ = std::fs::remove_file(path);
            }
        }

        Ok(())
    }
}

/// JSON-lines debug logger, enabled with `CCSWITCH_DEBUG`
///
/// Every write is best effort: a logging failure never changes the outcome of
/// a probe, a cache operation or a selection.
pub struct DebugLogger {
    enabled: bool,
    rotating_logger: Option<Mutex<RotatingLogger>>,
    session_id: String,
    redaction_patterns: Vec<Regex>,
}

impl DebugLogger {
    pub fn new() -> Self {
        let enabled = Self::parse_debug_enabled();
        let session_id = Uuid::new_v4().to_string()[..8].to_string();

        let rotating_logger = if enabled {
            Some(Mutex::new(RotatingLogger::new(Self::get_log_path())))
        } else {
            None
        };

        Self {
            enabled,
            rotating_logger,
            session_id,
            redaction_patterns: Self::compile_redaction_patterns(),
        }
    }

    /// Supports: true/false, 1/0, yes/no, on/off (case insensitive)
    fn parse_debug_enabled() -> bool {
        env::var(DEBUG_ENV)
            .map(|v| {
                matches!(
                    v.trim().to_lowercase().as_str(),
                    "true" | "1" | "yes" | "on"
                )
            })
            .unwrap_or(false)
    }

    fn get_log_path() -> PathBuf {
        match Paths::resolve() {
            Ok(paths) => paths.debug_log,
            Err(_) => PathBuf::from(".").join(LOG_FILE_NAME),
        }
    }

    fn compile_redaction_patterns() -> Vec<Regex> {
        let patterns = [
            r"(?i)authorization[:\s]+[^\s\n]+",
            r"(?i)bearer[:\s]+[^\s\n]+",
            r"(?i)api[_-]?key[:\s=]+[^\s\n]+",
            r"(?i)token[:\s=]+[^\s\n]+",
            r"\b(sk|cr)[-_][A-Za-z0-9_\-]{8,}",
        ];

        patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    }

    pub fn redact_sensitive_data(&self, text: &str) -> String {
        let mut redacted = text.to_string();

        for regex in &self.redaction_patterns {
            redacted = regex.replace_all(&redacted, "[REDACTED]").to_string();
        }

        // Suspiciously long opaque strings are probably keys
        if redacted.len() > 100
            && !redacted.contains(' ')
            && redacted
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_".contains(c))
        {
            redacted = format!("[REDACTED_LONG_STRING_{}chars]", redacted.len());
        }

        redacted
    }

    fn log_sync(
        &self,
        level: &str,
        component: &str,
        event: &str,
        message: &str,
        correlation_id: Option<String>,
        fields: HashMap<String, Value>,
    ) {
        if !self.enabled {
            return;
        }

        let entry = LogEntry {
            timestamp: Local::now().to_rfc3339(),
            level: level.to_string(),
            component: component.to_string(),
            event: event.to_string(),
            message: self.redact_sensitive_data(message),
            correlation_id: correlation_id.or_else(|| Some(self.session_id.clone())),
            fields,
        };

        if let Some(logger) = &self.rotating_logger {
            if let Ok(logger) = logger.lock() {
                if let Ok(json_line) = serde_json::to_string(&entry) {
                    let _ = logger.write_with_rotation(&json_line);
                }
            }
        }
    }

    pub fn debug(&self, component: &str, message: &str) {
        self.log_sync("DEBUG", component, "debug", message, None, HashMap::new());
    }

    pub fn warn(&self, component: &str, message: &str) {
        self.log_sync("WARN", component, "warning", message, None, HashMap::new());
    }

    pub fn error(&self, component: &str, message: &str) {
        self.log_sync("ERROR", component, "error", message, None, HashMap::new());
    }

    // Typed events for the probing engine

    pub fn probe_start(&self, profile: &str, timeout_ms: u64, correlation_id: String) {
        let mut fields = HashMap::new();
        fields.insert("profile".to_string(), Value::String(profile.to_string()));
        fields.insert("timeout_ms".to_string(), Value::Number(timeout_ms.into()));

        self.log_sync(
            "NETWORK",
            "Prober",
            "probe_start",
            &format!("Probing {}", profile),
            Some(correlation_id),
            fields,
        );
    }

    pub fn probe_attempt(
        &self,
        capability: &str,
        attempt: u32,
        http_status: Option<u16>,
        outcome: &str,
        correlation_id: String,
    ) {
        let mut fields = HashMap::new();
        fields.insert("capability".to_string(), Value::String(capability.to_string()));
        fields.insert("attempt".to_string(), Value::Number(attempt.into()));
        fields.insert("outcome".to_string(), Value::String(outcome.to_string()));
        if let Some(code) = http_status {
            fields.insert("http_status".to_string(), Value::Number(code.into()));
        }

        self.log_sync(
            "NETWORK",
            "Prober",
            "probe_attempt",
            &format!("{} attempt {}: {}", capability, attempt, outcome),
            Some(correlation_id),
            fields,
        );
    }

    pub fn probe_end(
        &self,
        available: bool,
        http_status: Option<u16>,
        duration_ms: u64,
        correlation_id: String,
    ) {
        let mut fields = HashMap::new();
        fields.insert("available".to_string(), Value::Bool(available));
        fields.insert("duration_ms".to_string(), Value::Number(duration_ms.into()));
        if let Some(code) = http_status {
            fields.insert("http_status".to_string(), Value::Number(code.into()));
        }

        self.log_sync(
            "NETWORK",
            "Prober",
            "probe_end",
            &format!(
                "Probe completed: {} ({}ms)",
                if available { "available" } else { "unavailable" },
                duration_ms
            ),
            Some(correlation_id),
            fields,
        );
    }

    pub fn cache_load(&self, entries: usize, fresh: bool) {
        let mut fields = HashMap::new();
        fields.insert("entries".to_string(), Value::Number(entries.into()));
        fields.insert("fresh".to_string(), Value::Bool(fresh));

        self.log_sync(
            "CACHE",
            "ResultCache",
            "cache_load",
            &format!("Loaded {} cached verdicts (fresh: {})", entries, fresh),
            None,
            fields,
        );
    }

    pub fn cache_save(&self, entries: usize, ok: bool) {
        let mut fields = HashMap::new();
        fields.insert("entries".to_string(), Value::Number(entries.into()));
        fields.insert("ok".to_string(), Value::Bool(ok));

        self.log_sync(
            "CACHE",
            "ResultCache",
            "cache_save",
            &format!("Saved {} verdicts", entries),
            None,
            fields,
        );
    }

    pub fn batch_complete(&self, total: usize, cached: usize, available: usize, duration_ms: u64) {
        let mut fields = HashMap::new();
        fields.insert("total".to_string(), Value::Number(total.into()));
        fields.insert("cached".to_string(), Value::Number(cached.into()));
        fields.insert("available".to_string(), Value::Number(available.into()));
        fields.insert("duration_ms".to_string(), Value::Number(duration_ms.into()));

        self.log_sync(
            "NETWORK",
            "BatchCoordinator",
            "batch_complete",
            &format!("{}/{} profiles available", available, total),
            None,
            fields,
        );
    }

    pub fn selection(&self, outcome: &str, profile: Option<&str>) {
        let mut fields = HashMap::new();
        fields.insert("outcome".to_string(), Value::String(outcome.to_string()));
        if let Some(name) = profile {
            fields.insert("profile".to_string(), Value::String(name.to_string()));
        }

        self.log_sync(
            "SELECT",
            "Selector",
            "selection",
            &format!("Selection finished: {}", outcome),
            None,
            fields,
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new()
    }
}

static DEBUG_LOGGER: OnceLock<DebugLogger> = OnceLock::new();

/// Process-wide logger, configured from the environment on first use
pub fn get_debug_logger() -> &'static DebugLogger {
    DEBUG_LOGGER.get_or_init(DebugLogger::new)
}
