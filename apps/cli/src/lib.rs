//! fleetbench CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};
pub use config::{Config, DEFAULT_CONFIG, MetricsConfig, OllamaConfig, ProbeConfig};

pub mod cmd;
mod config;

/// Benchmark tool calling across a fleet of inference hosts
#[derive(Debug, Parser)]
#[command(name = "fleetbench", version, about)]
pub struct App {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "fleetbench.toml")]
    pub config: PathBuf,

    /// Verbosity level (use -v, -vv, -vvv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the configured benchmark
    Run {
        /// Override the configured iteration count
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Override the configured output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the models loaded on every host
    Models,

    /// Print persisted latency and throughput statistics
    Stats {
        /// Metrics file, defaults to the configured one
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Generate the configuration file
    Generate {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl App {
    /// Initialize tracing subscriber based on verbosity
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = match self.verbose {
                0 => "info",
                1 => "info,fleetbench=debug",
                2 => "info,fleetbench=trace",
                _ => "trace",
            };
            EnvFilter::new(directive)
        });

        fmt()
            .without_time()
            .with_env_filter(filter)
            .with_target(self.verbose != 0)
            .init();
    }

    /// Execute the selected command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Run { iterations, output } => {
                let mut config = Config::load(&self.config)?;
                if let Some(iterations) = iterations {
                    config.iterations = iterations;
                }
                if let Some(output) = output {
                    config.output_dir = output;
                }
                cmd::run::run(config).await
            }
            Command::Models => cmd::models::run(&Config::load(&self.config)?).await,
            Command::Stats { path } => {
                let path = match path {
                    Some(path) => path,
                    None => Config::load(&self.config)?.metrics.path,
                };
                cmd::stats::run(&path)
            }
            Command::Generate { force } => Config::generate(&self.config, force),
        }
    }
}
