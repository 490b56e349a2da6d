//! Tests for the Aggregator: bucketing, persistence and lifecycle.

use fcore::CompletionMeta;
use fleetbench_metrics::{Aggregator, SizeBucket, shutdown};
use std::sync::Arc;
use std::time::Duration;

fn meta(model: &str, prompt: u64, output: u64) -> CompletionMeta {
    CompletionMeta {
        model: model.into(),
        prompt_eval_count: prompt,
        eval_count: output,
        total_duration: 3_000_000_000,
        eval_duration: 2_000_000_000,
        done: true,
        ..Default::default()
    }
}

fn open_temp() -> (tempfile::TempDir, Aggregator) {
    let dir = tempfile::tempdir().unwrap();
    let aggregator = Aggregator::open(dir.path().join("metrics.json"));
    (dir, aggregator)
}

#[test]
fn record_updates_one_bucket_and_overall() {
    let (_dir, aggregator) = open_temp();
    aggregator.record(&meta("llama3", 300, 40), 120.0);

    let metrics = aggregator.model("llama3").unwrap();
    assert_eq!(metrics.overall.total_requests, 1);
    assert_eq!(metrics.buckets.len(), 1);
    assert_eq!(metrics.buckets[0].bucket, SizeBucket::Small);
    assert_eq!(metrics.buckets[0].bucket.label(), "257-1024");
    for bucket in SizeBucket::ALL {
        if bucket != SizeBucket::Small {
            assert!(metrics.bucket(bucket).is_none(), "{bucket} touched");
        }
    }

    let stats = metrics.bucket(SizeBucket::Small).unwrap();
    assert_eq!(stats.tokens_per_second.mean, 20.0);
    assert_eq!(stats.ttft_ms.mean, 120.0);
    assert_eq!(stats.total_duration_ms.mean, 3000.0);
}

#[test]
fn overall_count_is_sum_of_buckets() {
    let (_dir, aggregator) = open_temp();
    for prompt in [10, 300, 300, 2000, 9000, 5000, 256] {
        aggregator.record(&meta("qwen", prompt, 10), 50.0);
    }

    let metrics = aggregator.model("qwen").unwrap();
    let bucket_total: u64 = metrics
        .buckets
        .iter()
        .map(|b| b.stats.total_requests)
        .sum();
    assert_eq!(metrics.overall.total_requests, 7);
    assert_eq!(bucket_total, 7);
    assert_eq!(metrics.buckets.len(), 5);

    let order: Vec<_> = metrics.buckets.iter().map(|b| b.bucket).collect();
    assert_eq!(order, SizeBucket::ALL.to_vec());
    assert_eq!(metrics.bucket(SizeBucket::Tiny).unwrap().total_requests, 2);

    let overall = &metrics.overall;
    assert_eq!(overall.ttft_ms.count, overall.total_requests);
    assert_eq!(overall.input_tokens.count, overall.total_requests);
}

#[test]
fn zero_eval_duration_records_zero_rate() {
    let (_dir, aggregator) = open_temp();
    let mut meta = meta("m", 5, 10);
    meta.eval_duration = 0;
    aggregator.record(&meta, 0.0);
    let metrics = aggregator.model("m").unwrap();
    assert_eq!(metrics.overall.tokens_per_second.mean, 0.0);
}

#[test]
fn save_then_reload_round_trips() {
    let (dir, aggregator) = open_temp();
    aggregator.record(&meta("a", 100, 20), 80.0);
    aggregator.record(&meta("a", 700, 30), 95.5);
    aggregator.record(&meta("b", 9000, 5), 400.0);
    aggregator.save().unwrap();

    let reloaded = Aggregator::open(dir.path().join("metrics.json"));
    let before = aggregator.snapshot();
    let after = reloaded.snapshot();
    assert_eq!(before.len(), 2);
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.model, a.model);
        assert_eq!(b.overall, a.overall);
        assert_eq!(b.buckets, a.buckets);
    }
}

#[test]
fn missing_directories_are_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/deeper/metrics.json");
    let aggregator = Aggregator::open(&path);
    aggregator.record(&meta("m", 1, 1), 1.0);
    aggregator.save().unwrap();
    assert!(path.exists());
}

#[test]
fn malformed_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    std::fs::write(&path, "{not json").unwrap();

    let aggregator = Aggregator::open(&path);
    assert!(aggregator.snapshot().is_empty());

    aggregator.record(&meta("m", 1, 1), 1.0);
    aggregator.save().unwrap();
    assert_eq!(Aggregator::open(&path).snapshot().len(), 1);
}

#[test]
fn concurrent_records_are_serialized() {
    let (_dir, aggregator) = open_temp();
    let aggregator = Arc::new(aggregator);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let aggregator = Arc::clone(&aggregator);
            std::thread::spawn(move || {
                for _ in 0..250 {
                    aggregator.record(&meta("shared", 512, 16), 10.0);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let metrics = aggregator.model("shared").unwrap();
    assert_eq!(metrics.overall.total_requests, 2000);
    assert_eq!(
        metrics.bucket(SizeBucket::Small).unwrap().total_requests,
        2000
    );
}

#[tokio::test]
async fn periodic_saver_writes_and_close_saves() {
    let (dir, aggregator) = open_temp();
    let path = dir.path().join("metrics.json");
    aggregator.start(Duration::from_millis(20));
    aggregator.start(Duration::from_millis(20));
    aggregator.record(&meta("m", 1, 1), 1.0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(path.exists());

    aggregator.record(&meta("m", 1, 1), 1.0);
    aggregator.close().await.unwrap();
    aggregator.close().await.unwrap();

    let reloaded = Aggregator::open(&path);
    assert_eq!(reloaded.model("m").unwrap().overall.total_requests, 2);
}

#[tokio::test]
async fn saver_stops_once_every_handle_is_dropped() {
    let (dir, aggregator) = open_temp();
    let path = dir.path().join("metrics.json");
    aggregator.start(Duration::from_millis(20));
    aggregator.record(&meta("m", 1, 1), 1.0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(path.exists());

    drop(aggregator);
    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::remove_file(&path).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!path.exists());
}

#[tokio::test]
async fn shutdown_without_instance_is_ok() {
    shutdown(None).await.unwrap();
}
