//! Benchmark configuration, read from a TOML file.

use anyhow::{Context, Result, bail};
use fcore::Host;
use model::BackendConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Written by `fleetbench generate`.
pub const DEFAULT_CONFIG: &str = r#"# Models to exercise, one job each per iteration
models = ["llama3.2:3b", "qwen2.5:7b"]
iterations = 3
output_dir = "results"

# Deadline of each network call
request_timeout_secs = 300

# Deadline of each job, including model load
job_timeout_secs = 600

[[hosts]]
address = "http://127.0.0.1:11434"
type = "ollama"
name = "local"

# [[hosts]]
# address = "http://10.0.0.12:8080"
# type = "llama.cpp"

[metrics]
enabled = true
path = "metrics/metrics.json"
save_interval_secs = 30

[ollama]
keep_alive = "5m"

[probe]
prompt = "What is the weather like in Paris today?"
tool = "get_current_weather"
argument = "location"
expected = "Paris"
"#;

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Models to exercise
    pub models: Vec<String>,

    /// How often every model is exercised
    pub iterations: usize,

    /// Where `summary.json` and `responses.json` go
    pub output_dir: PathBuf,

    /// Deadline of each network call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Deadline of each job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_timeout_secs: Option<u64>,

    /// The host pool
    pub hosts: Vec<Host>,

    /// Metrics recording
    pub metrics: MetricsConfig,

    /// Ollama specifics
    pub ollama: OllamaConfig,

    /// The question each model is asked
    pub probe: ProbeConfig,
}

/// The `[metrics]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether streams are recorded at all
    pub enabled: bool,
    /// Persistence file
    pub path: PathBuf,
    /// Seconds between periodic saves
    pub save_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("metrics/metrics.json"),
            save_interval_secs: 30,
        }
    }
}

/// The `[ollama]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// How long a readied model stays loaded
    pub keep_alive: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            keep_alive: "5m".into(),
        }
    }
}

/// The `[probe]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// User prompt
    pub prompt: String,
    /// Name of the offered tool
    pub tool: String,
    /// The tool's single argument
    pub argument: String,
    /// Value the argument must carry for a success
    pub expected: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            prompt: "What is the weather like in Paris today?".into(),
            tool: "get_current_weather".into(),
            argument: "location".into(),
            expected: "Paris".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            iterations: 1,
            output_dir: PathBuf::from("results"),
            request_timeout_secs: Some(300),
            job_timeout_secs: Some(600),
            hosts: Vec::new(),
            metrics: MetricsConfig::default(),
            ollama: OllamaConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(
            "loaded {} with {} host(s) and {} model(s)",
            path.display(),
            config.hosts.len(),
            config.models.len()
        );
        Ok(config)
    }

    /// Save the configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, toml::to_string(self)?)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        tracing::info!("configuration saved to {}", path.display());
        Ok(())
    }

    /// Write [`DEFAULT_CONFIG`] to `path`, refusing to overwrite unless
    /// `force` is set.
    pub fn generate(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!("{} already exists, pass --force to overwrite", path.display());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("generated default config at {}", path.display());
        Ok(())
    }

    /// Reject configurations a run cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            bail!("no hosts configured");
        }
        if self.models.is_empty() {
            bail!("no models configured");
        }
        if let Some(host) = self.hosts.iter().find(|h| h.address.trim().is_empty()) {
            bail!("host '{}' has an empty address", host.label());
        }
        Ok(())
    }

    /// Hosts as shared records.
    pub fn shared_hosts(&self) -> Vec<std::sync::Arc<Host>> {
        self.hosts.iter().cloned().map(std::sync::Arc::new).collect()
    }

    /// Settings for the backend providers.
    pub fn backend(&self) -> BackendConfig {
        BackendConfig {
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            keep_alive: self.ollama.keep_alive.clone(),
            ..Default::default()
        }
    }

    /// Per-job deadline, if configured.
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}
