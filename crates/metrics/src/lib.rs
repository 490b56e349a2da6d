//! Online latency and throughput statistics, persisted as flat JSON.
//!
//! Every completed stream becomes one [`Sample`]. The [`Aggregator`] folds
//! it into the model's overall [`RunningAggregatedStats`] and into exactly
//! one [`SizeBucket`] chosen by prompt size, using Welford's one-pass
//! update so no raw samples are ever buffered.

pub use {
    aggregate::{RunningAggregatedStats, Sample},
    aggregator::{Aggregator, shutdown},
    bucket::SizeBucket,
    model::{BucketStats, ModelMetrics},
    stat::RunningStat,
};

mod aggregate;
mod aggregator;
mod bucket;
mod model;
mod stat;
mod store;
