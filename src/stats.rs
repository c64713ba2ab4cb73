// Local usage statistics (usage-stats.json)
use crate::core::network::batch::UsageRecorder;
use crate::core::network::debug_logger::get_debug_logger;
use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

pub const STATS_FORMAT_VERSION: u32 = 1;
/// Distinct messages remembered per error type
pub const MAX_ERROR_MESSAGES: usize = 10;
const TOP_N: usize = 5;
const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub uses: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_response_time: f64,
    pub total_response_time: f64,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorTypeStats {
    pub count: u64,
    pub last_occurred: Option<DateTime<Utc>>,
    /// Most recent distinct messages, newest first
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    pub total: u64,
    pub types: BTreeMap<String, ErrorTypeStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub avg_response_time: f64,
    pub total_response_time: f64,
    pub checks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsData {
    pub version: u32,
    pub first_use: DateTime<Utc>,
    pub last_use: DateTime<Utc>,
    pub total_uses: u64,
    pub providers: BTreeMap<String, ProviderStats>,
    pub commands: BTreeMap<String, u64>,
    /// Uses per local hour of day
    pub hourly_distribution: Vec<u64>,
    /// Uses per local weekday, Sunday first
    pub daily_distribution: Vec<u64>,
    pub errors: ErrorStats,
    pub performance: PerformanceStats,
}

impl StatsData {
    pub fn fresh() -> Self {
        let now = Utc::now();
        Self {
            version: STATS_FORMAT_VERSION,
            first_use: now,
            last_use: now,
            total_uses: 0,
            providers: BTreeMap::new(),
            commands: BTreeMap::new(),
            hourly_distribution: vec![0; 24],
            daily_distribution: vec![0; 7],
            errors: ErrorStats::default(),
            performance: PerformanceStats::default(),
        }
    }

    fn repair(mut self) -> Self {
        if self.hourly_distribution.len() != 24 {
            self.hourly_distribution = vec![0; 24];
        }
        if self.daily_distribution.len() != 7 {
            self.daily_distribution = vec![0; 7];
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub name: String,
    pub uses: u64,
    pub success_rate: f64,
    pub avg_response_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_uses: u64,
    pub days_used: i64,
    pub avg_uses_per_day: f64,
    pub top_providers: Vec<ProviderSummary>,
    pub top_commands: Vec<(String, u64)>,
    pub peak_hour: Option<usize>,
    pub peak_day: Option<&'static str>,
    pub errors: u64,
    pub avg_response_time: u64,
    pub last_use: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsExport<'a> {
    export_time: DateTime<Utc>,
    summary: &'a StatsSummary,
    raw_data: &'a StatsData,
}

/// Read-modify-write access to the statistics file
///
/// Every update holds an exclusive advisory lock on a sibling `.lock` file,
/// so two concurrent invocations do not lose each other's counters. Recording
/// failures are logged and otherwise ignored.
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current data; a missing or corrupt file reads as fresh statistics
    pub fn load(&self) -> StatsData {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return StatsData::fresh();
        };

        match serde_json::from_str::<StatsData>(&content) {
            Ok(data) if data.version >= STATS_FORMAT_VERSION => data.repair(),
            Ok(_) => StatsData::fresh(),
            Err(e) => {
                get_debug_logger()
                    .warn("StatsStore", &format!("Resetting corrupt stats file: {}", e));
                StatsData::fresh()
            }
        }
    }

    fn save(&self, data: &StatsData) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)
    }

    fn update(&self, apply: impl FnOnce(&mut StatsData)) {
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let lock_file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(self.path.with_extension("lock"))?;
            lock_file.lock_exclusive()?;

            let mut data = self.load();
            apply(&mut data);
            let saved = self.save(&data);

            let _ = lock_file.unlock();
            saved
        })();

        if let Err(e) = result {
            get_debug_logger()
                .warn("StatsStore", &format!("Failed to update stats: {}", e));
        }
    }

    pub fn record_command(&self, command: &str) {
        let now = Local::now();
        self.update(|data| {
            data.total_uses += 1;
            data.last_use = Utc::now();
            *data.commands.entry(command.to_string()).or_insert(0) += 1;
            data.hourly_distribution[now.hour() as usize] += 1;
            data.daily_distribution[now.weekday().num_days_from_sunday() as usize] += 1;
        });
    }

    pub fn record_provider_use(&self, identifier: &str, success: bool, latency_ms: Option<u64>) {
        self.update(|data| {
            let provider = data.providers.entry(identifier.to_string()).or_default();
            provider.uses += 1;
            provider.last_used = Some(Utc::now());
            if success {
                provider.successes += 1;
            } else {
                provider.failures += 1;
            }

            if let Some(ms) = latency_ms.filter(|ms| *ms > 0) {
                provider.total_response_time += ms as f64;
                provider.avg_response_time = provider.total_response_time / provider.uses as f64;

                let perf = &mut data.performance;
                perf.total_response_time += ms as f64;
                perf.checks += 1;
                perf.avg_response_time = perf.total_response_time / perf.checks as f64;
            }
        });
    }

    pub fn record_error(&self, kind: &str, message: &str) {
        self.update(|data| {
            data.errors.total += 1;
            let entry = data.errors.types.entry(kind.to_string()).or_default();
            entry.count += 1;
            entry.last_occurred = Some(Utc::now());
            if !entry.messages.iter().any(|m| m == message) {
                entry.messages.insert(0, message.to_string());
                entry.messages.truncate(MAX_ERROR_MESSAGES);
            }
        });
    }

    pub fn summary(&self) -> StatsSummary {
        summarize(&self.load(), Utc::now())
    }

    pub fn reset(&self) -> std::io::Result<()> {
        self.save(&StatsData::fresh())
    }

    /// Write summary and raw data to `output`, returning the absolute path
    pub fn export(&self, output: &Path) -> std::io::Result<PathBuf> {
        let data = self.load();
        let summary = summarize(&data, Utc::now());
        let document = StatsExport {
            export_time: Utc::now(),
            summary: &summary,
            raw_data: &data,
        };

        fs::write(output, serde_json::to_string_pretty(&document)?)?;
        Ok(fs::canonicalize(output).unwrap_or_else(|_| output.to_path_buf()))
    }
}

impl UsageRecorder for StatsStore {
    fn record(&self, identifier: &str, success: bool, latency_ms: Option<u64>) {
        self.record_provider_use(identifier, success, latency_ms);
    }
}

/// Index of the largest bucket, None when every bucket is empty
fn peak(buckets: &[u64]) -> Option<usize> {
    let (index, max) = buckets
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
    (*max > 0).then_some(index)
}

pub fn summarize(data: &StatsData, now: DateTime<Utc>) -> StatsSummary {
    let mut providers: Vec<(&String, &ProviderStats)> = data.providers.iter().collect();
    providers.sort_by(|a, b| b.1.uses.cmp(&a.1.uses));
    let top_providers = providers
        .into_iter()
        .take(TOP_N)
        .map(|(name, p)| ProviderSummary {
            name: name.clone(),
            uses: p.uses,
            success_rate: if p.uses > 0 {
                p.successes as f64 / p.uses as f64 * 100.0
            } else {
                0.0
            },
            avg_response_time: p.avg_response_time.round() as u64,
        })
        .collect();

    let mut commands: Vec<(String, u64)> =
        data.commands.iter().map(|(k, v)| (k.clone(), *v)).collect();
    commands.sort_by(|a, b| b.1.cmp(&a.1));
    commands.truncate(TOP_N);

    let elapsed_ms = (now - data.first_use).num_milliseconds().max(0);
    let days_used = ((elapsed_ms + 86_399_999) / 86_400_000).max(1);

    StatsSummary {
        total_uses: data.total_uses,
        days_used,
        avg_uses_per_day: data.total_uses as f64 / days_used as f64,
        top_providers,
        top_commands: commands,
        peak_hour: peak(&data.hourly_distribution),
        peak_day: peak(&data.daily_distribution).map(|i| DAY_NAMES[i]),
        errors: data.errors.total,
        avg_response_time: data.performance.avg_response_time.round() as u64,
        last_use: data.last_use,
    }
}
