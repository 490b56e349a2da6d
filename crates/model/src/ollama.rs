//! Ollama backend.
//!
//! Talks to the native API: `/api/ps` for loaded models, `/api/generate`
//! with a `keep_alive` to load or release a model, and `/api/chat` with
//! newline-delimited JSON for streaming.

use crate::{BackendConfig, HttpTransport, http};
use anyhow::{Context, Result, bail};
use fcore::{
    CancellationToken, CompletionMeta, Host, Message, Provider, StreamCallbacks, StreamChunk,
    StreamRequest, Tool, ToolCall, cancellable,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Instant;

/// The Ollama provider.
pub struct Ollama {
    http: HttpTransport,
    keep_alive: String,
}

impl Ollama {
    /// Create a provider with its own HTTP client.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            http: HttpTransport::new(config)?,
            keep_alive: config.keep_alive.clone(),
        })
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
    stream: bool,
}

/// One line of a `/api/chat` stream.
#[derive(Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatDelta>,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    meta: CompletionMeta,
}

#[derive(Default, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct PsResponse {
    #[serde(default)]
    models: Vec<PsModel>,
}

#[derive(Deserialize)]
struct PsModel {
    name: String,
}

/// Whether two model names refer to the same model, treating a missing
/// tag as `:latest`.
fn same_model(a: &str, b: &str) -> bool {
    a.strip_suffix(":latest").unwrap_or(a) == b.strip_suffix(":latest").unwrap_or(b)
}

impl Provider for Ollama {
    async fn loaded_models(&self, host: &Host, cancel: &CancellationToken) -> Result<Vec<String>> {
        let url = host.url("/api/ps");
        let ps: PsResponse = cancellable(cancel, self.http.get_json(&url)).await?;
        Ok(ps.models.into_iter().map(|m| m.name).collect())
    }

    async fn ensure_model_ready(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let loaded = self.loaded_models(host, cancel).await?;
        if loaded.iter().any(|m| same_model(m, model)) {
            tracing::debug!("{model} already loaded on {}", host.label());
            return Ok(());
        }

        tracing::info!("loading {model} on {}", host.label());
        let body = json!({ "model": model, "keep_alive": self.keep_alive, "stream": false });
        let url = host.url("/api/generate");
        let _: Value = cancellable(cancel, self.http.post_json(&url, &body))
            .await
            .with_context(|| format!("failed to load {model} on {}", host.label()))?;
        Ok(())
    }

    async fn unload_model(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tracing::debug!("unloading {model} from {}", host.label());
        let body = json!({ "model": model, "keep_alive": 0, "stream": false });
        let url = host.url("/api/generate");
        let _: Value = cancellable(cancel, self.http.post_json(&url, &body))
            .await
            .with_context(|| format!("failed to unload {model} from {}", host.label()))?;
        Ok(())
    }

    async fn stream(
        &self,
        request: StreamRequest,
        mut callbacks: StreamCallbacks<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        let body = ChatBody {
            model: &request.model,
            messages: &request.messages,
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            stream: true,
        };
        let url = request.host.url("/api/chat");
        let response = cancellable(cancel, self.http.post_stream(&url, &body)).await?;

        let lines = http::lines(response);
        let mut lines = std::pin::pin!(lines);
        let result: Result<()> = async {
            while let Some(line) =
                cancellable(cancel, async { lines.next().await.transpose() }).await?
            {
                let line: ChatLine = serde_json::from_str(&line)
                    .with_context(|| format!("malformed ollama stream line: {line}"))?;
                if let Some(error) = line.error {
                    bail!("ollama error: {error}");
                }

                let delta = line.message.unwrap_or_default();
                let chunk = StreamChunk {
                    content: delta.content,
                    tool_calls: delta.tool_calls,
                };
                if !chunk.is_empty() {
                    callbacks.chunk(&chunk);
                }

                if line.meta.done {
                    let mut meta = line.meta;
                    if meta.model.is_empty() {
                        meta.model = request.model.clone();
                    }
                    callbacks.complete(&meta);
                    return Ok(());
                }
            }
            bail!("ollama stream ended before the final document")
        }
        .await;

        if let Err(e) = result {
            callbacks.complete(&CompletionMeta {
                model: request.model.clone(),
                total_duration: started.elapsed().as_nanos() as u64,
                done: false,
                ..Default::default()
            });
            return Err(e);
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.http.close()
    }
}
