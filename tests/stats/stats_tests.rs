use ccswitch::core::network::UsageRecorder;
use ccswitch::stats::{summarize, StatsData, StatsStore, MAX_ERROR_MESSAGES};
use chrono::{Duration, Utc};
use std::fs;

use crate::common::create_temp_dir;

#[test]
fn test_commands_and_distributions() {
    let dir = create_temp_dir();
    let stats = StatsStore::new(dir.path().join("usage-stats.json"));

    stats.record_command("switch");
    stats.record_command("switch");
    stats.record_command("list");

    let data = stats.load();
    assert_eq!(data.total_uses, 3);
    assert_eq!(data.commands["switch"], 2);
    assert_eq!(data.hourly_distribution.iter().sum::<u64>(), 3);
    assert_eq!(data.daily_distribution.iter().sum::<u64>(), 3);

    let summary = stats.summary();
    assert_eq!(summary.top_commands[0], ("switch".to_string(), 2));
    assert!(summary.peak_hour.is_some());
    assert!(summary.peak_day.is_some());
}

#[test]
fn test_provider_uses_and_latency_average() {
    let dir = create_temp_dir();
    let stats = StatsStore::new(dir.path().join("usage-stats.json"));

    stats.record_provider_use("work", true, Some(100));
    stats.record_provider_use("work", false, None);
    stats.record("work", true, Some(200));

    let data = stats.load();
    let work = &data.providers["work"];
    assert_eq!(work.uses, 3);
    assert_eq!(work.successes, 2);
    assert_eq!(work.failures, 1);
    assert_eq!(work.total_response_time, 300.0);
    assert_eq!(work.avg_response_time, 100.0);
    assert_eq!(data.performance.checks, 2);
    assert_eq!(data.performance.avg_response_time, 150.0);

    let summary = stats.summary();
    assert_eq!(summary.top_providers[0].name, "work");
    assert!((summary.top_providers[0].success_rate - 66.666).abs() < 0.01);
}

#[test]
fn test_error_messages_are_deduplicated_and_bounded() {
    let dir = create_temp_dir();
    let stats = StatsStore::new(dir.path().join("usage-stats.json"));

    stats.record_error("selection", "same");
    stats.record_error("selection", "same");
    for i in 0..(MAX_ERROR_MESSAGES + 3) {
        stats.record_error("selection", &format!("message {}", i));
    }

    let data = stats.load();
    let entry = &data.errors.types["selection"];
    assert_eq!(data.errors.total, (MAX_ERROR_MESSAGES + 5) as u64);
    assert_eq!(entry.messages.len(), MAX_ERROR_MESSAGES);
    assert_eq!(
        entry.messages[0],
        format!("message {}", MAX_ERROR_MESSAGES + 2)
    );
}

#[test]
fn test_corrupt_file_reads_as_fresh_and_is_replaced_on_write() {
    let dir = create_temp_dir();
    let path = dir.path().join("usage-stats.json");
    fs::write(&path, "not json").unwrap();

    let stats = StatsStore::new(&path);
    assert_eq!(stats.load().total_uses, 0);

    stats.record_command("stats");
    assert_eq!(stats.load().total_uses, 1);
}

#[test]
fn test_reset_and_export() {
    let dir = create_temp_dir();
    let stats = StatsStore::new(dir.path().join("usage-stats.json"));
    stats.record_command("switch");

    let export = dir.path().join("stats-export.json");
    let written = stats.export(&export).unwrap();
    assert!(written.exists());
    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&export).unwrap()).unwrap();
    assert_eq!(document["summary"]["totalUses"], 1);
    assert_eq!(document["rawData"]["commands"]["switch"], 1);

    stats.reset().unwrap();
    assert_eq!(stats.load().total_uses, 0);
}

#[test]
fn test_days_used_rounds_up() {
    let mut data = StatsData::fresh();
    let now = Utc::now();
    data.first_use = now - Duration::hours(30);
    data.total_uses = 4;

    let summary = summarize(&data, now);
    assert_eq!(summary.days_used, 2);
    assert_eq!(summary.avg_uses_per_day, 2.0);
    assert_eq!(summary.peak_hour, None);
}
