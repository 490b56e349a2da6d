//! Backend construction settings.

use std::time::Duration;

/// Settings shared by every backend built for one run.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Deadline of each network call, `None` to wait forever
    pub request_timeout: Option<Duration>,

    /// Deadline for establishing a connection
    pub connect_timeout: Duration,

    /// How long Ollama keeps a model warm after `ensure_model_ready`
    pub keep_alive: String,

    /// Pause between llama.cpp health polls
    pub ready_poll_interval: Duration,

    /// Health polls before llama.cpp readiness gives up
    pub ready_attempts: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(300)),
            connect_timeout: Duration::from_secs(10),
            keep_alive: "5m".into(),
            ready_poll_interval: Duration::from_millis(500),
            ready_attempts: 240,
        }
    }
}
