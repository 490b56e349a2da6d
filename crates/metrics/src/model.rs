//! Per-model metrics document.

use crate::{RunningAggregatedStats, Sample, SizeBucket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics for one size bucket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BucketStats {
    /// Which prompt-size range
    pub bucket: SizeBucket,
    /// Statistics of requests in that range
    pub stats: RunningAggregatedStats,
}

/// Everything recorded for one model; the unit of persistence.
///
/// `buckets` is ordered smallest first and holds at most one entry per
/// label. `overall.total_requests` equals the sum of the bucket counts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelMetrics {
    /// Model name
    pub model: String,
    /// When the last sample landed
    pub last_updated: DateTime<Utc>,
    /// Statistics over every request
    pub overall: RunningAggregatedStats,
    /// Statistics per prompt-size bucket
    #[serde(default)]
    pub buckets: Vec<BucketStats>,
}

impl ModelMetrics {
    /// Empty metrics for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            last_updated: Utc::now(),
            overall: RunningAggregatedStats::default(),
            buckets: Vec::new(),
        }
    }

    /// Fold a sample into the overall stats and its one size bucket.
    pub fn record(&mut self, sample: &Sample, prompt_tokens: u64) {
        let bucket = SizeBucket::for_tokens(prompt_tokens);
        let index = match self.buckets.binary_search_by_key(&bucket, |b| b.bucket) {
            Ok(index) => index,
            Err(index) => {
                self.buckets.insert(
                    index,
                    BucketStats {
                        bucket,
                        stats: RunningAggregatedStats::default(),
                    },
                );
                index
            }
        };

        self.buckets[index].stats.record(sample);
        self.overall.record(sample);
        self.last_updated = Utc::now();
    }

    /// Statistics of one bucket, if it has seen a request.
    pub fn bucket(&self, bucket: SizeBucket) -> Option<&RunningAggregatedStats> {
        self.buckets
            .iter()
            .find(|b| b.bucket == bucket)
            .map(|b| &b.stats)
    }
}
