// Batch probing: cache merge, concurrent fan-out, ordered results
use crate::core::network::debug_logger::get_debug_logger;
use crate::core::network::fingerprint::profile_fingerprint;
use crate::core::network::prober::Prober;
use crate::core::network::result_cache::ResultCache;
use crate::core::network::types::{ProbeReport, Verdict, VerdictMap};
use crate::profiles::Profile;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Instant;

/// Receives one label per profile as soon as its verdict is known
pub trait ProgressReporter {
    fn on_progress(&self, label: &str);

    /// Called once after the last verdict
    fn finish(&self) {}
}

/// Reporter that discards every event
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn on_progress(&self, _label: &str) {}
}

/// Sink for per-probe usage tuples
///
/// Called after every probe of the batch has settled, so implementations may
/// block. They must swallow their own failures.
pub trait UsageRecorder {
    fn record(&self, identifier: &str, success: bool, latency_ms: Option<u64>);
}

/// Result of one batch run
#[derive(Debug)]
pub struct BatchOutcome {
    /// One report per input profile, in input order
    pub reports: Vec<ProbeReport>,
    /// How many verdicts were reused from the cache
    pub cache_hits: usize,
    /// Warning text when the cache could not be written back
    pub cache_error: Option<String>,
}

impl BatchOutcome {
    pub fn available_count(&self) -> usize {
        self.reports.iter().filter(|r| r.verdict.available).count()
    }
}

pub struct BatchCoordinator {
    prober: Prober,
    cache: ResultCache,
    progress: Box<dyn ProgressReporter>,
    recorder: Option<Box<dyn UsageRecorder>>,
}

impl BatchCoordinator {
    pub fn new(prober: Prober, cache: ResultCache) -> Self {
        Self {
            prober,
            cache,
            progress: Box::new(NoopProgress),
            recorder: None,
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_recorder(mut self, recorder: Box<dyn UsageRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Produce one verdict per profile
    ///
    /// Cached verdicts are reused unless `force_refresh` is set; every other
    /// profile is probed concurrently. The map of this run (cached and fresh
    /// verdicts alike) replaces the stored cache once everything is done.
    pub async fn run(&self, profiles: &[Profile], force_refresh: bool) -> BatchOutcome {
        let logger = get_debug_logger();
        let started = Instant::now();

        let cached = if force_refresh {
            VerdictMap::new()
        } else {
            self.cache.load().await
        };

        let fingerprints: Vec<String> = profiles.iter().map(profile_fingerprint).collect();
        let mut slots: Vec<Option<(Verdict, bool)>> = vec![None; profiles.len()];
        let mut pending = FuturesUnordered::new();
        let mut cache_hits = 0;

        for (index, profile) in profiles.iter().enumerate() {
            if let Some(verdict) = cached.get(&fingerprints[index]) {
                self.progress.on_progress(&format!("{}📋", profile.name));
                slots[index] = Some((verdict.clone(), true));
                cache_hits += 1;
                continue;
            }

            let prober = &self.prober;
            pending.push(async move {
                let verdict = match prober.probe(profile).await {
                    Ok(verdict) => verdict,
                    Err(e) => Verdict::unavailable(None, e.to_string()),
                };
                (index, verdict)
            });
        }

        while let Some((index, verdict)) = pending.next().await {
            let profile = &profiles[index];
            let glyph = if verdict.available { "✓" } else { "✗" };
            self.progress.on_progress(&format!("{}{}", profile.name, glyph));

            slots[index] = Some((verdict, false));
        }
        drop(pending);
        self.progress.finish();

        let mut snapshot = VerdictMap::new();
        let mut reports = Vec::with_capacity(profiles.len());
        for (index, (profile, slot)) in profiles.iter().zip(slots).enumerate() {
            let (verdict, from_cache) = match slot {
                Some((verdict, from_cache)) => {
                    if let (false, Some(recorder)) = (from_cache, &self.recorder) {
                        recorder.record(&profile.name, verdict.available, verdict.latency_ms);
                    }
                    snapshot.insert(fingerprints[index].clone(), verdict.clone());
                    (verdict, from_cache)
                }
                None => {
                    logger.warn(
                        "BatchCoordinator",
                        &format!("No verdict for profile {}", index + 1),
                    );
                    (Verdict::missing(), false)
                }
            };

            reports.push(ProbeReport {
                index,
                profile: profile.clone(),
                verdict,
                from_cache,
            });
        }

        let cache_error = match self.cache.save(&snapshot).await {
            Ok(()) => None,
            Err(e) => {
                logger.warn("BatchCoordinator", &format!("Cache not saved: {}", e));
                Some(e.to_string())
            }
        };

        let outcome = BatchOutcome {
            reports,
            cache_hits,
            cache_error,
        };

        logger.batch_complete(
            profiles.len(),
            cache_hits,
            outcome.available_count(),
            started.elapsed().as_millis() as u64,
        );

        outcome
    }
}
