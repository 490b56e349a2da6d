//! Run-level tallies and the two report files.

use crate::{Job, JobResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Success rate of one job identity across the run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JobSummary {
    /// Job identity, a model name for benchmark runs
    pub model: String,
    /// Results the classifier accepted
    pub successes: u64,
    /// Results collected
    pub attempts: u64,
    /// `successes / attempts` as a percentage, zero without attempts
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default)]
struct Tally {
    successes: u64,
    attempts: u64,
    responses: Vec<Value>,
}

/// Everything a run collected, keyed by job identity.
///
/// Payloads are appended, never replaced, so a job repeated over several
/// iterations keeps every response in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    tallies: BTreeMap<String, Tally>,
}

impl RunReport {
    /// An empty report listing `jobs` with zero attempts.
    pub fn new(jobs: &[Job]) -> Self {
        let tallies = jobs
            .iter()
            .map(|job| (job.name.clone(), Tally::default()))
            .collect();
        Self { tallies }
    }

    /// Fold one result in.
    pub fn push(&mut self, result: JobResult) {
        let tally = self.tallies.entry(result.job.name).or_default();
        tally.attempts += 1;
        if result.success {
            tally.successes += 1;
        }
        tally.responses.push(result.payload);
    }

    /// Results collected across every job.
    pub fn total_attempts(&self) -> u64 {
        self.tallies.values().map(|t| t.attempts).sum()
    }

    /// Accepted results for `job`.
    pub fn successes(&self, job: &str) -> u64 {
        self.tallies.get(job).map_or(0, |t| t.successes)
    }

    /// Results collected for `job`.
    pub fn attempts(&self, job: &str) -> u64 {
        self.tallies.get(job).map_or(0, |t| t.attempts)
    }

    /// Every payload collected for `job`, oldest first.
    pub fn responses(&self, job: &str) -> &[Value] {
        self.tallies
            .get(job)
            .map(|t| t.responses.as_slice())
            .unwrap_or_default()
    }

    /// One summary row per job identity, ordered by name.
    pub fn summary(&self) -> Vec<JobSummary> {
        self.tallies
            .iter()
            .map(|(model, tally)| JobSummary {
                model: model.clone(),
                successes: tally.successes,
                attempts: tally.attempts,
                success_rate: if tally.attempts == 0 {
                    0.0
                } else {
                    tally.successes as f64 / tally.attempts as f64 * 100.0
                },
            })
            .collect()
    }

    /// Write `summary.json` and `responses.json` into `dir`, creating it.
    pub fn write(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let summary = dir.join("summary.json");
        std::fs::write(&summary, serde_json::to_vec_pretty(&self.summary())?)
            .with_context(|| format!("failed to write {}", summary.display()))?;

        let archive: BTreeMap<&str, &[Value]> = self
            .tallies
            .iter()
            .map(|(name, tally)| (name.as_str(), tally.responses.as_slice()))
            .collect();
        let responses = dir.join("responses.json");
        std::fs::write(&responses, serde_json::to_vec_pretty(&archive)?)
            .with_context(|| format!("failed to write {}", responses.display()))?;

        tracing::info!("wrote reports to {}", dir.display());
        Ok(())
    }
}
