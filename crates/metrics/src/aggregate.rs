//! Five running statistics updated together as one unit.

use crate::RunningStat;
use fcore::CompletionMeta;
use serde::{Deserialize, Serialize};

/// The measurements taken from one completed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    /// Time to first chunk, milliseconds
    pub ttft_ms: f64,
    /// Output tokens per second of generation time
    pub tokens_per_second: f64,
    /// Prompt tokens
    pub input_tokens: f64,
    /// Generated tokens
    pub output_tokens: f64,
    /// Wall time of the exchange, milliseconds
    pub total_duration_ms: f64,
}

impl Sample {
    /// Derive a sample from final stream metadata and a measured TTFT.
    pub fn from_meta(meta: &CompletionMeta, ttft_ms: f64) -> Self {
        Self {
            ttft_ms,
            tokens_per_second: meta.tokens_per_second(),
            input_tokens: meta.prompt_eval_count as f64,
            output_tokens: meta.eval_count as f64,
            total_duration_ms: meta.total_duration as f64 / 1e6,
        }
    }
}

/// Running statistics for every measured quantity.
///
/// `total_requests` always equals each contained stat's `count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct RunningAggregatedStats {
    /// Samples recorded
    pub total_requests: u64,
    /// Time to first token, milliseconds
    pub ttft_ms: RunningStat,
    /// Output tokens per second
    pub tokens_per_second: RunningStat,
    /// Prompt tokens
    pub input_tokens: RunningStat,
    /// Generated tokens
    pub output_tokens: RunningStat,
    /// Wall time, milliseconds
    pub total_duration_ms: RunningStat,
}

impl RunningAggregatedStats {
    /// Fold one sample into all five statistics.
    pub fn record(&mut self, sample: &Sample) {
        self.total_requests += 1;
        self.ttft_ms.update(sample.ttft_ms);
        self.tokens_per_second.update(sample.tokens_per_second);
        self.input_tokens.update(sample.input_tokens);
        self.output_tokens.update(sample.output_tokens);
        self.total_duration_ms.update(sample.total_duration_ms);
    }
}
