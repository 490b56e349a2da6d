//! Batched job dispatch for fleetbench.
//!
//! A [`Dispatcher`] fans jobs out across a fixed pool of hosts in batches
//! of at most one job per host, collects exactly one [`JobResult`] per job
//! and runs the [`Executor`]'s reset between batches. What a job does and
//! what counts as success are the [`Executor`] and [`Classifier`] seams;
//! [`ToolCallProbe`] and [`ToolCallCriterion`] are the stock pair.

pub use {
    criterion::ToolCallCriterion,
    dispatcher::Dispatcher,
    executor::{Classifier, Executor},
    job::{Job, JobResult},
    probe::{ToolCallProbe, weather_tool},
    report::{JobSummary, RunReport},
};

mod criterion;
mod dispatcher;
mod executor;
mod job;
mod probe;
mod report;
