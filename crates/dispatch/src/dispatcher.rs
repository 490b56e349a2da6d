//! The batch dispatcher.
//!
//! Jobs are cut into consecutive batches of at most one job per host. Each
//! batch gets a fresh job queue and one worker per host; workers pull until
//! the queue is closed and drained, and every pulled job yields exactly one
//! result. The dispatcher drains one result per job, then awaits the
//! executor's reset before the next batch starts. A reset is bounded by the
//! reset timeout (the job timeout unless set) and abandoned a grace period
//! after the run is cancelled.

use crate::{Classifier, Executor, Job, JobResult, RunReport};
use anyhow::{Result, bail};
use fcore::{CancellationToken, Host, ProviderError};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

/// How long a reset may keep running once the run is cancelled.
const RESET_GRACE: Duration = Duration::from_secs(5);

/// Runs jobs across a fixed host pool.
pub struct Dispatcher<E, C> {
    hosts: Vec<Arc<Host>>,
    executor: Arc<E>,
    classifier: Arc<C>,
    job_timeout: Option<Duration>,
    reset_timeout: Option<Duration>,
    reset_grace: Duration,
}

impl<E: Executor, C: Classifier> Dispatcher<E, C> {
    /// Create a dispatcher over `hosts`.
    pub fn new(hosts: Vec<Arc<Host>>, executor: Arc<E>, classifier: C) -> Self {
        Self {
            hosts,
            executor,
            classifier: Arc::new(classifier),
            job_timeout: None,
            reset_timeout: None,
            reset_grace: RESET_GRACE,
        }
    }

    /// Fail any job still running after `timeout`.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    /// Abandon a reset still running after `timeout`.
    ///
    /// Without this, resets share the job timeout.
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = Some(timeout);
        self
    }

    /// How long a reset may run on after the run is cancelled.
    pub fn with_reset_grace(mut self, grace: Duration) -> Self {
        self.reset_grace = grace;
        self
    }

    /// The host pool.
    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    /// Run every job `iterations` times.
    ///
    /// Job failures are folded into the report; the run itself only fails
    /// when there is no host to run on. Cancelling `cancel` fails the jobs
    /// still in flight or not yet started.
    pub async fn run(
        &self,
        jobs: &[Job],
        iterations: usize,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        if self.hosts.is_empty() {
            bail!("no hosts to dispatch to");
        }

        let mut report = RunReport::new(jobs);
        let batches = jobs.len().div_ceil(self.hosts.len());
        for iteration in 1..=iterations {
            tracing::info!("iteration {iteration}/{iterations}: {} jobs in {batches} batches", jobs.len());
            for (index, batch) in jobs.chunks(self.hosts.len()).enumerate() {
                tracing::debug!("batch {}/{batches}: {} jobs", index + 1, batch.len());
                for result in self.run_batch(batch, cancel).await {
                    report.push(result);
                }

                if let Err(e) = self.reset(batch, cancel).await {
                    tracing::warn!("reset after batch {} failed: {e:#}", index + 1);
                }
            }
        }
        Ok(report)
    }

    /// Run the executor's reset under its deadline and the run's cancellation.
    async fn reset(&self, batch: &[Job], cancel: &CancellationToken) -> Result<()> {
        let token = CancellationToken::new();
        let reset = self.executor.reset(&self.hosts, batch, &token);
        let limit = self.reset_timeout.or(self.job_timeout);
        let bounded = async {
            match limit {
                Some(limit) => match tokio::time::timeout(limit, reset).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ProviderError::Timeout(limit).into()),
                },
                None => reset.await,
            }
        };
        let abandon = async {
            cancel.cancelled().await;
            tokio::time::sleep(self.reset_grace).await;
        };

        let outcome = tokio::select! {
            outcome = bounded => outcome,
            _ = abandon => Err(ProviderError::Cancelled.into()),
        };
        token.cancel();
        outcome
    }

    /// Run one batch to completion, returning one result per job.
    async fn run_batch(&self, batch: &[Job], cancel: &CancellationToken) -> Vec<JobResult> {
        let capacity = batch.len().max(1);
        let (job_tx, job_rx) = mpsc::channel::<Job>(capacity);
        let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(capacity);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = JoinSet::new();
        for host in &self.hosts {
            let worker = Worker {
                host: Arc::clone(host),
                executor: Arc::clone(&self.executor),
                classifier: Arc::clone(&self.classifier),
                jobs: Arc::clone(&job_rx),
                results: result_tx.clone(),
                timeout: self.job_timeout,
                cancel: cancel.clone(),
            };
            workers.spawn(worker.run());
        }
        drop(result_tx);

        for job in batch {
            if job_tx.send(job.clone()).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let mut results = Vec::with_capacity(batch.len());
        while results.len() < batch.len() {
            match result_rx.recv().await {
                Some(result) => results.push(result),
                None => break,
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("dispatch worker failed: {e}");
            }
        }

        if results.len() < batch.len() {
            let mut missing = batch.to_vec();
            for result in &results {
                if let Some(pos) = missing.iter().position(|job| *job == result.job) {
                    missing.swap_remove(pos);
                }
            }
            for job in missing {
                tracing::warn!("job '{}' produced no result", job.name);
                results.push(JobResult::failure(job, "", "worker exited before reporting"));
            }
        }
        results
    }
}

/// One worker, bound to one host for the lifetime of a batch.
struct Worker<E, C> {
    host: Arc<Host>,
    executor: Arc<E>,
    classifier: Arc<C>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<JobResult>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl<E: Executor, C: Classifier> Worker<E, C> {
    async fn run(self) {
        loop {
            let job = self.jobs.lock().await.recv().await;
            let Some(job) = job else {
                return;
            };
            let result = self.execute(job).await;
            if self.results.send(result).await.is_err() {
                return;
            }
        }
    }

    async fn execute(&self, job: Job) -> JobResult {
        let started = Instant::now();
        let token = self.cancel.child_token();
        tracing::debug!("running '{}' on {}", job.name, self.host.label());

        let run = self.executor.execute(&self.host, &job, &token);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    token.cancel();
                    Err(ProviderError::Timeout(limit).into())
                }
            },
            None => run.await,
        };

        let (success, payload) = match outcome {
            Ok(payload) => (self.classifier.classify(&payload), payload),
            Err(e) => {
                tracing::warn!("'{}' on {} failed: {e:#}", job.name, self.host.label());
                (false, json!({ "error": format!("{e:#}") }))
            }
        };

        let elapsed = started.elapsed();
        tracing::info!(
            job = %job.name,
            host = %self.host.label(),
            success,
            elapsed_ms = elapsed.as_millis() as u64,
            "job finished"
        );
        JobResult {
            job,
            host: self.host.address.clone(),
            success,
            payload,
            elapsed,
        }
    }
}
