//! `fleetbench run`: the benchmark itself.

use crate::Config;
use anyhow::Result;
use dispatch::{Dispatcher, Job, JobSummary, ToolCallCriterion, ToolCallProbe, weather_tool};
use fcore::{CancellationToken, Provider};
use metrics::Aggregator;
use model::{HostMux, Recorded, build_backend};
use std::sync::Arc;
use std::time::Duration;

/// Run every configured model on the host pool and write the reports.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let aggregator = config
        .metrics
        .enabled
        .then(|| Aggregator::open(&config.metrics.path));
    if let Some(aggregator) = &aggregator {
        aggregator.start(Duration::from_secs(config.metrics.save_interval_secs.max(1)));
    }

    let backend = config.backend();
    let mux = Arc::new(HostMux::build(&config.hosts, |kind| {
        Ok(Recorded::new(build_backend(kind, &backend)?, aggregator.clone()))
    })?);

    let probe = ToolCallProbe::new(
        Arc::clone(&mux),
        &config.probe.prompt,
        weather_tool(&config.probe.tool, &config.probe.argument),
    );
    let criterion = ToolCallCriterion::new(
        &config.probe.tool,
        &config.probe.argument,
        &config.probe.expected,
    );
    let mut dispatcher = Dispatcher::new(config.shared_hosts(), Arc::new(probe), criterion);
    if let Some(timeout) = config.job_timeout() {
        dispatcher = dispatcher.with_job_timeout(timeout);
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            tracing::warn!("interrupted, cancelling outstanding jobs (ctrl-c again to exit)");
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::error!("interrupted again, exiting");
                std::process::exit(130);
            }
        })
    };

    let jobs: Vec<Job> = config.models.iter().map(Job::new).collect();
    tracing::info!(
        "benchmarking {} model(s) on {} host(s), {} iteration(s)",
        jobs.len(),
        config.hosts.len(),
        config.iterations
    );
    let outcome = dispatcher.run(&jobs, config.iterations, &cancel).await;
    interrupt.abort();

    if let Err(e) = mux.close() {
        tracing::warn!("failed to close providers: {e:#}");
    }
    if let Err(e) = metrics::shutdown(aggregator.as_ref()).await {
        tracing::error!("final metrics save failed: {e:#}");
    }

    let report = outcome?;
    report.write(&config.output_dir)?;
    print_summary(&report.summary());
    Ok(())
}

fn print_summary(summary: &[JobSummary]) {
    let width = summary
        .iter()
        .map(|row| row.model.len())
        .max()
        .unwrap_or(0)
        .max("model".len());
    println!("{:<width$}  {:>9}  {:>8}  {:>7}", "model", "successes", "attempts", "rate");
    for row in summary {
        println!(
            "{:<width$}  {:>9}  {:>8}  {:>6.1}%",
            row.model, row.successes, row.attempts, row.success_rate
        );
    }
}
