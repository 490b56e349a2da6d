//! Tests for batching, result attribution and the reset barrier.

use anyhow::{Result, bail};
use fcore::{CancellationToken, Host, cancellable};
use fleetbench_dispatch::{Dispatcher, Executor, Job};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Executor that logs every start and reset.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    batches: Mutex<Vec<usize>>,
    delay: Duration,
    fail_reset: bool,
    hang_reset: bool,
}

impl Recorder {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Executor for Recorder {
    async fn execute(&self, host: &Arc<Host>, job: &Job, cancel: &CancellationToken) -> Result<Value> {
        self.events.lock().unwrap().push(format!("start:{}", job.name));
        let delay = match job.name.as_str() {
            "slow" => Duration::from_secs(5),
            _ => self.delay,
        };
        cancellable(cancel, async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await?;

        if job.name.starts_with("broken") {
            bail!("connection refused by {}", host.address);
        }
        Ok(json!({ "model": job.name, "host": host.address, "ok": !job.name.starts_with("wrong") }))
    }

    async fn reset(
        &self,
        _hosts: &[Arc<Host>],
        batch: &[Job],
        _cancel: &CancellationToken,
    ) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.events.lock().unwrap().push("reset".into());
        self.batches.lock().unwrap().push(batch.len());
        if self.hang_reset {
            std::future::pending::<()>().await;
        }
        if self.fail_reset {
            bail!("unload failed");
        }
        Ok(())
    }
}

fn hosts(n: usize) -> Vec<Arc<Host>> {
    (0..n)
        .map(|i| Arc::new(Host::new(format!("http://10.0.0.{i}:11434"), "ollama")))
        .collect()
}

fn jobs(names: &[&str]) -> Vec<Job> {
    names.iter().map(|n| Job::new(*n)).collect()
}

fn ok_flag(payload: &Value) -> bool {
    payload["ok"].as_bool().unwrap_or(false)
}

#[tokio::test]
async fn seven_jobs_four_hosts_two_batches() {
    let executor = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(hosts(4), Arc::clone(&executor), ok_flag);
    let names = ["a", "b", "c", "d", "e", "f", "g"];

    let report = dispatcher
        .run(&jobs(&names), 1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*executor.batches.lock().unwrap(), vec![4, 3]);
    assert_eq!(report.total_attempts(), 7);
    for name in names {
        assert_eq!(report.attempts(name), 1, "{name}");
        assert_eq!(report.successes(name), 1, "{name}");
        assert_eq!(report.responses(name)[0]["model"], name);
    }
}

#[tokio::test]
async fn transport_error_becomes_failure_payload() {
    let executor = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(hosts(2), Arc::clone(&executor), ok_flag);

    let report = dispatcher
        .run(&jobs(&["a", "broken", "c"]), 1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.total_attempts(), 3);
    assert_eq!(report.successes("broken"), 0);
    let error = report.responses("broken")[0]["error"].as_str().unwrap();
    assert!(error.contains("connection refused"), "{error}");
    assert_eq!(report.successes("a"), 1);
    assert_eq!(report.successes("c"), 1);
}

#[tokio::test]
async fn classification_failure_keeps_payload() {
    let executor = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(hosts(1), Arc::clone(&executor), ok_flag);

    let report = dispatcher
        .run(&jobs(&["wrong"]), 1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.successes("wrong"), 0);
    assert_eq!(report.responses("wrong")[0]["model"], "wrong");
}

#[tokio::test]
async fn reset_is_a_barrier_between_batches() {
    let executor = Arc::new(Recorder::with_delay(Duration::from_millis(20)));
    let dispatcher = Dispatcher::new(hosts(3), Arc::clone(&executor), ok_flag);

    dispatcher
        .run(&jobs(&["a", "b", "c", "d", "e"]), 1, &CancellationToken::new())
        .await
        .unwrap();

    let events = executor.events();
    assert_eq!(events.len(), 7);
    let first_reset = events.iter().position(|e| e == "reset").unwrap();
    assert_eq!(first_reset, 3);
    let mut first_batch = events[..3].to_vec();
    first_batch.sort();
    assert_eq!(first_batch, vec!["start:a", "start:b", "start:c"]);
    let mut second_batch = events[4..6].to_vec();
    second_batch.sort();
    assert_eq!(second_batch, vec!["start:d", "start:e"]);
    assert_eq!(events[6], "reset");
}

#[tokio::test]
async fn iterations_append_responses() {
    let executor = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(hosts(4), Arc::clone(&executor), ok_flag);

    let report = dispatcher
        .run(&jobs(&["a", "b", "c"]), 3, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.attempts("a"), 3);
    assert_eq!(report.responses("b").len(), 3);
    assert_eq!(report.total_attempts(), 9);
    assert_eq!(*executor.batches.lock().unwrap(), vec![3, 3, 3]);
}

#[tokio::test]
async fn job_timeout_fails_only_that_job() {
    let executor = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(hosts(2), Arc::clone(&executor), ok_flag)
        .with_job_timeout(Duration::from_millis(50));

    let started = std::time::Instant::now();
    let report = dispatcher
        .run(&jobs(&["slow", "fast"]), 1, &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.successes("slow"), 0);
    let error = report.responses("slow")[0]["error"].as_str().unwrap();
    assert!(error.contains("timed out"), "{error}");
    assert_eq!(report.successes("fast"), 1);
}

#[tokio::test]
async fn cancelled_run_still_reports_every_job() {
    let executor = Arc::new(Recorder::with_delay(Duration::from_secs(5)));
    let dispatcher = Dispatcher::new(hosts(2), Arc::clone(&executor), ok_flag);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = dispatcher
        .run(&jobs(&["a", "b", "c"]), 1, &cancel)
        .await
        .unwrap();

    assert_eq!(report.total_attempts(), 3);
    for name in ["a", "b", "c"] {
        assert_eq!(report.successes(name), 0);
        assert_eq!(report.responses(name)[0]["error"], "request cancelled");
    }
}

#[tokio::test]
async fn failed_reset_does_not_stop_the_run() {
    let executor = Arc::new(Recorder {
        fail_reset: true,
        ..Default::default()
    });
    let dispatcher = Dispatcher::new(hosts(1), Arc::clone(&executor), ok_flag);

    let report = dispatcher
        .run(&jobs(&["a", "b"]), 1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.total_attempts(), 2);
    assert_eq!(*executor.batches.lock().unwrap(), vec![1, 1]);
}

#[tokio::test]
async fn hung_reset_gives_way_to_the_job_timeout() {
    let executor = Arc::new(Recorder {
        hang_reset: true,
        ..Default::default()
    });
    let dispatcher = Dispatcher::new(hosts(1), Arc::clone(&executor), ok_flag)
        .with_job_timeout(Duration::from_millis(50));

    let report = tokio::time::timeout(
        Duration::from_secs(2),
        dispatcher.run(&jobs(&["a", "b"]), 1, &CancellationToken::new()),
    )
    .await
    .expect("run outlived its reset timeout")
    .unwrap();

    assert_eq!(report.successes("a"), 1);
    assert_eq!(report.successes("b"), 1);
    assert_eq!(*executor.batches.lock().unwrap(), vec![1, 1]);
}

#[tokio::test]
async fn hung_reset_is_abandoned_after_cancel() {
    let executor = Arc::new(Recorder {
        hang_reset: true,
        ..Default::default()
    });
    let dispatcher = Dispatcher::new(hosts(2), Arc::clone(&executor), ok_flag)
        .with_reset_grace(Duration::from_millis(200));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = tokio::time::timeout(
        Duration::from_secs(2),
        dispatcher.run(&jobs(&["a", "b", "c"]), 1, &cancel),
    )
    .await
    .expect("run hung in reset after cancel")
    .unwrap();

    assert_eq!(report.total_attempts(), 3);
    assert_eq!(*executor.batches.lock().unwrap(), vec![2, 1]);
}

#[tokio::test]
async fn reset_timeout_overrides_job_timeout() {
    let executor = Arc::new(Recorder {
        hang_reset: true,
        ..Default::default()
    });
    let dispatcher = Dispatcher::new(hosts(1), Arc::clone(&executor), ok_flag)
        .with_job_timeout(Duration::from_secs(30))
        .with_reset_timeout(Duration::from_millis(50));

    let started = std::time::Instant::now();
    dispatcher
        .run(&jobs(&["a"]), 1, &CancellationToken::new())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn no_hosts_is_an_error() {
    let dispatcher = Dispatcher::new(Vec::new(), Arc::new(Recorder::default()), ok_flag);
    assert!(
        dispatcher
            .run(&jobs(&["a"]), 1, &CancellationToken::new())
            .await
            .is_err()
    );
}
