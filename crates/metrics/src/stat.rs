//! Welford running statistics over a scalar stream.

use serde::{Deserialize, Serialize};

/// Count, mean, variance, min and max of a stream, without the samples.
///
/// All fields are zero while `count == 0` and must not be reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct RunningStat {
    /// Number of samples folded in
    pub count: u64,
    /// Running mean
    pub mean: f64,
    /// Sum of squared deviations from the mean
    pub m2: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
}

impl RunningStat {
    /// Fold one sample in.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Population variance (`m2 / count`), zero when empty.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.m2 / self.count as f64
    }

    /// Sample variance (`m2 / (count - 1)`), zero below two samples.
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        self.m2 / (self.count - 1) as f64
    }

    /// Population standard deviation.
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Whether no sample has been folded in yet.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
