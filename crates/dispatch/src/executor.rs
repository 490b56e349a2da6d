//! The two seams of the dispatcher.

use crate::Job;
use anyhow::Result;
use fcore::{CancellationToken, Host};
use serde_json::Value;
use std::sync::Arc;

/// Runs one job against one host, and resets hosts between batches.
pub trait Executor: Send + Sync + 'static {
    /// Execute `job` on `host`, returning the raw response payload.
    ///
    /// Errors become failure results; they never stop the run.
    fn execute(
        &self,
        host: &Arc<Host>,
        job: &Job,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Clear host state after a batch. The next batch starts only once
    /// this returns.
    ///
    /// `cancel` fires when the reset overruns its deadline, or a grace
    /// period after the run itself is cancelled.
    fn reset(
        &self,
        hosts: &[Arc<Host>],
        batch: &[Job],
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Decides whether a payload counts as a success.
pub trait Classifier: Send + Sync + 'static {
    /// Whether `payload` is a success.
    fn classify(&self, payload: &Value) -> bool;
}

impl<F> Classifier for F
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    fn classify(&self, payload: &Value) -> bool {
        self(payload)
    }
}
