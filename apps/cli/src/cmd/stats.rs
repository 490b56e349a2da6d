//! `fleetbench stats`: persisted per-model statistics.

use anyhow::{Result, bail};
use metrics::{Aggregator, RunningAggregatedStats};
use std::path::Path;

/// Print the statistics stored at `path`.
pub fn run(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("no metrics file at {}", path.display());
    }

    let models = Aggregator::open(path).snapshot();
    if models.is_empty() {
        println!("no metrics recorded in {}", path.display());
        return Ok(());
    }

    for model in models {
        println!(
            "{} (updated {})",
            model.model,
            model.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
        );
        print_row("overall", &model.overall);
        for bucket in &model.buckets {
            print_row(bucket.bucket.label(), &bucket.stats);
        }
        println!();
    }
    Ok(())
}

fn print_row(label: &str, stats: &RunningAggregatedStats) {
    println!(
        "  {label:<10} n={:<5} ttft {:>8.1}ms ±{:<7.1} tps {:>7.1} ±{:<6.1} in {:>7.0} out {:>6.0} total {:>9.1}ms",
        stats.total_requests,
        stats.ttft_ms.mean,
        stats.ttft_ms.stddev(),
        stats.tokens_per_second.mean,
        stats.tokens_per_second.stddev(),
        stats.input_tokens.mean,
        stats.output_tokens.mean,
        stats.total_duration_ms.mean,
    );
}
