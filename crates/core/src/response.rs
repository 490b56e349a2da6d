//! Final metadata of a completed stream

use serde::{Deserialize, Serialize};

/// Final metadata delivered once per stream through `on_complete`.
///
/// Durations are nanoseconds, matching Ollama's terminal `done` document.
/// Providers with a different unit convert on the way in.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CompletionMeta {
    /// The model that served the request
    #[serde(default)]
    pub model: String,

    /// Prompt (input) tokens
    #[serde(default)]
    pub prompt_eval_count: u64,

    /// Generated (output) tokens
    #[serde(default)]
    pub eval_count: u64,

    /// Wall time of the whole exchange
    #[serde(default)]
    pub total_duration: u64,

    /// Time spent loading the model
    #[serde(default)]
    pub load_duration: u64,

    /// Time spent evaluating the prompt
    #[serde(default)]
    pub prompt_eval_duration: u64,

    /// Time spent generating output tokens
    #[serde(default)]
    pub eval_duration: u64,

    /// Why generation stopped, if the backend said
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,

    /// False when the stream was aborted and the fields are best-effort
    #[serde(default)]
    pub done: bool,
}

impl CompletionMeta {
    /// Output tokens per second of generation time.
    ///
    /// Zero when the backend reported no generation time.
    pub fn tokens_per_second(&self) -> f64 {
        if self.eval_duration == 0 {
            return 0.0;
        }
        self.eval_count as f64 / (self.eval_duration as f64 / 1e9)
    }
}
