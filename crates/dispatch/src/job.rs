//! Jobs and their results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// One unit of work, identified by name. For a benchmark run the name is
/// the model to exercise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Job {
    /// Job identity
    pub name: String,
}

impl Job {
    /// Create a job
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// The outcome of one job on one host.
///
/// `payload` is always JSON: the executor's raw response, or an
/// `{"error": "..."}` object when execution failed.
#[derive(Debug, Clone)]
pub struct JobResult {
    /// The job this result answers
    pub job: Job,
    /// Address of the host that ran it
    pub host: String,
    /// Whether the classifier accepted the payload
    pub success: bool,
    /// Raw response or synthesized error
    pub payload: Value,
    /// Wall time of the execution
    pub elapsed: Duration,
}

impl JobResult {
    /// A failed result carrying `error` as its payload.
    pub fn failure(job: Job, host: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            job,
            host: host.into(),
            success: false,
            payload: serde_json::json!({ "error": error.to_string() }),
            elapsed: Duration::ZERO,
        }
    }
}
