use ccswitch::core::network::{
    profile_fingerprint, BatchCoordinator, ProgressReporter, Prober, ResultCache, UsageRecorder,
    Verdict, VerdictMap,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::common::{create_temp_dir, fast_options, ok, profile, refused, MockHttpClient};

#[derive(Clone, Default)]
struct RecordingProgress {
    labels: Rc<RefCell<Vec<String>>>,
    finished: Rc<RefCell<bool>>,
}

impl ProgressReporter for RecordingProgress {
    fn on_progress(&self, label: &str) {
        self.labels.borrow_mut().push(label.to_string());
    }

    fn finish(&self) {
        *self.finished.borrow_mut() = true;
    }
}

#[derive(Clone, Default)]
struct RecordingUsage {
    records: Rc<RefCell<Vec<(String, bool, Option<u64>)>>>,
}

impl UsageRecorder for RecordingUsage {
    fn record(&self, identifier: &str, success: bool, latency_ms: Option<u64>) {
        self.records
            .borrow_mut()
            .push((identifier.to_string(), success, latency_ms));
    }
}

fn coordinator(client: &MockHttpClient, cache: ResultCache) -> BatchCoordinator {
    BatchCoordinator::new(
        Prober::with_client(Box::new(client.clone()), fast_options()),
        cache,
    )
}

#[tokio::test]
async fn test_reports_keep_input_order_and_progress_follows_completion() {
    let dir = create_temp_dir();
    let client = MockHttpClient::new()
        .script("https://slow.test", vec![ok(200)])
        .with_delay("https://slow.test", Duration::from_millis(150))
        .script("https://fast.test", vec![ok(200)]);
    let progress = RecordingProgress::default();

    let profiles = vec![
        profile("slow", "https://slow.test"),
        profile("fast", "https://fast.test"),
    ];
    let outcome = coordinator(&client, ResultCache::new(dir.path().join("cache.json")))
        .with_progress(Box::new(progress.clone()))
        .run(&profiles, false)
        .await;

    let names: Vec<&str> = outcome
        .reports
        .iter()
        .map(|r| r.profile.name.as_str())
        .collect();
    assert_eq!(names, vec!["slow", "fast"]);
    assert_eq!(outcome.reports[0].index, 0);
    assert_eq!(outcome.reports[1].display_index(), 2);
    assert_eq!(
        *progress.labels.borrow(),
        vec!["fast✓".to_string(), "slow✓".to_string()]
    );
    assert!(*progress.finished.borrow());
}

#[tokio::test]
async fn test_cached_verdicts_skip_probing() {
    let dir = create_temp_dir();
    let cache_path = dir.path().join("cache.json");
    let cached_profile = profile("cached", "https://cached.test");
    let fresh_profile = profile("fresh", "https://fresh.test");

    let mut seeded = VerdictMap::new();
    seeded.insert(
        profile_fingerprint(&cached_profile),
        Verdict::unavailable(Some(500), "HTTP 500"),
    );
    ResultCache::new(&cache_path).save(&seeded).await.unwrap();

    let client = MockHttpClient::new().script("https://fresh.test", vec![ok(200)]);
    let progress = RecordingProgress::default();
    let outcome = coordinator(&client, ResultCache::new(&cache_path))
        .with_progress(Box::new(progress.clone()))
        .run(&[cached_profile.clone(), fresh_profile.clone()], false)
        .await;

    assert_eq!(outcome.cache_hits, 1);
    assert!(outcome.reports[0].from_cache);
    assert_eq!(
        outcome.reports[0].verdict.error_message.as_deref(),
        Some("HTTP 500")
    );
    assert!(!outcome.reports[1].from_cache);
    assert!(outcome.reports[1].verdict.available);
    let cached_calls = client
        .requests()
        .iter()
        .filter(|r| r.url.contains("cached"))
        .count();
    assert_eq!(cached_calls, 0);
    assert!(progress.labels.borrow().contains(&"cached📋".to_string()));

    // The saved map covers the whole run, cached and fresh alike
    let saved = ResultCache::new(&cache_path).load().await;
    assert_eq!(saved.len(), 2);
    assert!(saved.contains_key(&profile_fingerprint(&fresh_profile)));
}

#[tokio::test]
async fn test_force_refresh_ignores_cache() {
    let dir = create_temp_dir();
    let cache_path = dir.path().join("cache.json");
    let p = profile("one", "https://one.test");

    let mut seeded = VerdictMap::new();
    seeded.insert(
        profile_fingerprint(&p),
        Verdict::unavailable(None, "connection refused"),
    );
    ResultCache::new(&cache_path).save(&seeded).await.unwrap();

    let client = MockHttpClient::new().script("https://one.test", vec![ok(200)]);
    let outcome = coordinator(&client, ResultCache::new(&cache_path))
        .run(&[p.clone()], true)
        .await;

    assert_eq!(outcome.cache_hits, 0);
    assert!(outcome.reports[0].verdict.available);
    assert_eq!(client.call_count(), 1);

    let saved = ResultCache::new(&cache_path).load().await;
    assert!(saved[&profile_fingerprint(&p)].available);
}

#[tokio::test]
async fn test_second_run_within_window_reuses_identical_verdict() {
    let dir = create_temp_dir();
    let cache_path = dir.path().join("cache.json");
    let p = profile("one", "https://one.test");
    let client = MockHttpClient::new().script("https://one.test", vec![ok(429)]);

    let first = coordinator(&client, ResultCache::new(&cache_path))
        .run(&[p.clone()], false)
        .await;
    let second = coordinator(&client, ResultCache::new(&cache_path))
        .run(&[p.clone()], false)
        .await;

    assert_eq!(first.reports[0].verdict, second.reports[0].verdict);
    assert!(second.reports[0].from_cache);
    assert_eq!(client.call_count(), 2, "only the first run probes");
}

#[tokio::test]
async fn test_invalid_profile_is_folded_into_verdict() {
    let dir = create_temp_dir();
    let client = MockHttpClient::new();
    let broken = ccswitch::profiles::Profile::new("broken", "not a url", "sk-test-0123456789");

    let outcome = coordinator(&client, ResultCache::new(dir.path().join("cache.json")))
        .run(&[broken], false)
        .await;

    assert!(!outcome.reports[0].verdict.available);
    assert!(outcome.reports[0]
        .verdict
        .error_message
        .as_deref()
        .unwrap_or_default()
        .starts_with("Invalid profile"));
}

#[tokio::test]
async fn test_usage_recorder_sees_fresh_probes_only() {
    let dir = create_temp_dir();
    let cache_path = dir.path().join("cache.json");
    let cached = profile("cached", "https://cached.test");

    let mut seeded = VerdictMap::new();
    seeded.insert(profile_fingerprint(&cached), Verdict::unavailable(None, "x"));
    ResultCache::new(&cache_path).save(&seeded).await.unwrap();

    let client = MockHttpClient::new()
        .script("https://up.test", vec![ok(200)])
        .script("https://down.test", vec![refused()]);
    let usage = RecordingUsage::default();

    coordinator(&client, ResultCache::new(&cache_path))
        .with_recorder(Box::new(usage.clone()))
        .run(
            &[
                cached,
                profile("up", "https://up.test"),
                profile("down", "https://down.test"),
            ],
            false,
        )
        .await;

    let mut records = usage.records.borrow().clone();
    records.sort();
    assert_eq!(
        records,
        vec![
            ("down".to_string(), false, None),
            ("up".to_string(), true, Some(42)),
        ]
    );
}

#[tokio::test]
async fn test_cache_write_failure_is_reported_not_fatal() {
    let dir = create_temp_dir();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "x").unwrap();

    let client = MockHttpClient::new().script("https://one.test", vec![ok(200)]);
    let outcome = coordinator(&client, ResultCache::new(blocker.join("cache.json")))
        .run(&[profile("one", "https://one.test")], false)
        .await;

    assert!(outcome.cache_error.is_some());
    assert!(outcome.reports[0].verdict.available);
}

/// Progress and usage events written to one shared timeline
#[derive(Clone, Default)]
struct Timeline {
    events: Rc<RefCell<Vec<String>>>,
}

impl ProgressReporter for Timeline {
    fn on_progress(&self, label: &str) {
        self.events.borrow_mut().push(format!("progress:{}", label));
    }
}

impl UsageRecorder for Timeline {
    fn record(&self, identifier: &str, _success: bool, _latency_ms: Option<u64>) {
        self.events.borrow_mut().push(format!("usage:{}", identifier));
    }
}

#[tokio::test]
async fn test_usage_is_recorded_after_every_probe_settles() {
    let dir = create_temp_dir();
    let client = MockHttpClient::new()
        .script("https://slow.test", vec![ok(200)])
        .with_delay("https://slow.test", Duration::from_millis(100))
        .script("https://fast.test", vec![ok(200)]);
    let timeline = Timeline::default();

    coordinator(&client, ResultCache::new(dir.path().join("cache.json")))
        .with_progress(Box::new(timeline.clone()))
        .with_recorder(Box::new(timeline.clone()))
        .run(
            &[
                profile("slow", "https://slow.test"),
                profile("fast", "https://fast.test"),
            ],
            false,
        )
        .await;

    assert_eq!(
        *timeline.events.borrow(),
        vec![
            "progress:fast✓".to_string(),
            "progress:slow✓".to_string(),
            "usage:slow".to_string(),
            "usage:fast".to_string(),
        ]
    );
}
