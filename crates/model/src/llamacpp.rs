//! llama.cpp server backend.
//!
//! Uses the OpenAI-compatible surface of `llama-server`: `/v1/models` for
//! the served model, `/health` for readiness and `/v1/chat/completions`
//! with server-sent events for streaming. A server hosts exactly one model,
//! so unloading is not possible and is skipped.

use crate::{BackendConfig, HttpTransport, http};
use anyhow::{Context, Result, bail};
use fcore::{
    CancellationToken, CompletionMeta, FunctionCall, Host, Message, Provider, ProviderError, Role,
    StreamCallbacks, StreamChunk, StreamRequest, Tool, ToolCall, cancellable,
};
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// The llama.cpp provider.
pub struct LlamaCpp {
    http: HttpTransport,
    poll_interval: Duration,
    attempts: u32,
}

impl LlamaCpp {
    /// Create a provider with its own HTTP client.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            http: HttpTransport::new(config)?,
            poll_interval: config.ready_poll_interval,
            attempts: config.ready_attempts.max(1),
        })
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
    stream: bool,
    stream_options: Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<Value>,
}

impl<'a> From<&'a Message> for ChatMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let tool_calls = message
            .tool_calls
            .iter()
            .map(|call| {
                let arguments = match &call.function.arguments {
                    Value::String(raw) => raw.clone(),
                    other => other.to_string(),
                };
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.function.name, "arguments": arguments },
                })
            })
            .collect();
        Self {
            role: message.role,
            content: &message.content,
            tool_calls,
        }
    }
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// One `data:` event of a chat completion stream.
#[derive(Deserialize)]
struct ChatEvent {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    timings: Option<Timings>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// llama.cpp's native timing block, milliseconds.
#[derive(Deserialize)]
struct Timings {
    #[serde(default)]
    prompt_n: u64,
    #[serde(default)]
    prompt_ms: f64,
    #[serde(default)]
    predicted_n: u64,
    #[serde(default)]
    predicted_ms: f64,
}

#[derive(Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds stream events into chunks and the final metadata.
#[derive(Default)]
struct Accumulator {
    meta: CompletionMeta,
    calls: BTreeMap<usize, PartialCall>,
    /// The name the server reports, often an alias or a gguf path
    served: String,
    finished: bool,
    timed: bool,
}

impl Accumulator {
    /// Apply one event, returning the content chunk it carries, if any.
    fn apply(&mut self, event: ChatEvent) -> Result<Option<StreamChunk>> {
        if let Some(error) = event.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| error.to_string());
            bail!("llama.cpp error: {message}");
        }
        if !event.model.is_empty() {
            self.served = event.model;
        }
        if let Some(timings) = event.timings {
            self.timed = true;
            self.meta.prompt_eval_count = timings.prompt_n;
            self.meta.eval_count = timings.predicted_n;
            self.meta.prompt_eval_duration = (timings.prompt_ms * 1e6) as u64;
            self.meta.eval_duration = (timings.predicted_ms * 1e6) as u64;
        }
        if let Some(usage) = event.usage.filter(|_| !self.timed) {
            self.meta.prompt_eval_count = usage.prompt_tokens;
            self.meta.eval_count = usage.completion_tokens;
        }

        let mut content = String::new();
        for choice in event.choices {
            if let Some(reason) = choice.finish_reason {
                self.finished = true;
                self.meta.done_reason = Some(reason);
            }
            if let Some(delta) = choice.delta.content {
                content.push_str(&delta);
            }
            for delta in choice.delta.tool_calls {
                let call = self.calls.entry(delta.index).or_default();
                if let Some(id) = delta.id {
                    call.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        call.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
            }
        }

        Ok((!content.is_empty()).then(|| StreamChunk::text(content)))
    }

    /// Drain the merged tool calls, in index order.
    fn take_tool_calls(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.calls)
            .into_values()
            .map(|call| {
                let arguments = serde_json::from_str(&call.arguments)
                    .unwrap_or(Value::String(call.arguments));
                ToolCall {
                    id: call.id,
                    function: FunctionCall {
                        name: call.name,
                        arguments,
                    },
                }
            })
            .collect()
    }
}

impl Provider for LlamaCpp {
    async fn loaded_models(&self, host: &Host, cancel: &CancellationToken) -> Result<Vec<String>> {
        let url = host.url("/v1/models");
        let list: ModelList = cancellable(cancel, self.http.get_json(&url)).await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Poll `/health` until the server reports the model loaded.
    async fn ensure_model_ready(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = host.url("/health");
        for attempt in 1..=self.attempts {
            let response = cancellable(cancel, self.http.get(&url)).await?;
            if response.status() != StatusCode::SERVICE_UNAVAILABLE {
                http::check(response).await?;
                tracing::debug!("{} ready for {model}", host.label());
                return Ok(());
            }

            tracing::trace!("{} still loading, attempt {attempt}", host.label());
            cancellable(cancel, async {
                tokio::time::sleep(self.poll_interval).await;
                Ok(())
            })
            .await?;
        }
        Err(ProviderError::Timeout(self.poll_interval * self.attempts).into())
    }

    async fn unload_model(
        &self,
        host: &Host,
        model: &str,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        tracing::debug!("{} serves a single model, not unloading {model}", host.label());
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
            messages: request.messages.iter().map(ChatMessage::from).collect(),
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            stream: true,
            stream_options: json!({ "include_usage": true }),
        };
        let url = request.host.url("/v1/chat/completions");
        let response = cancellable(cancel, self.http.post_stream(&url, &body)).await?;

        let mut acc = Accumulator::default();
        let lines = http::lines(response);
        let mut lines = std::pin::pin!(lines);
        let result: Result<()> = async {
            while let Some(line) =
                cancellable(cancel, async { lines.next().await.transpose() }).await?
            {
                let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                    continue;
                };
                if data == "[DONE]" {
                    return Ok(());
                }

                let event: ChatEvent = serde_json::from_str(data)
                    .with_context(|| format!("malformed llama.cpp event: {data}"))?;
                if let Some(chunk) = acc.apply(event)? {
                    callbacks.chunk(&chunk);
                }
            }
            if acc.finished {
                return Ok(());
            }
            bail!("llama.cpp stream ended before a finish reason")
        }
        .await;

        let calls = acc.take_tool_calls();
        if !calls.is_empty() {
            callbacks.chunk(&StreamChunk::tool(calls));
        }

        if !acc.served.is_empty() && acc.served != request.model {
            tracing::debug!("{} served {} as {}", request.host.label(), request.model, acc.served);
        }
        let mut meta = acc.meta;
        meta.model = request.model.clone();
        meta.total_duration = started.elapsed().as_nanos() as u64;
        meta.done = result.is_ok();
        callbacks.complete(&meta);
        result
    }

    fn close(&self) -> Result<()> {
        self.http.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: &str) -> ChatEvent {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn tool_call_deltas_merge_by_index() {
        let mut acc = Accumulator::default();
        acc.apply(event(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"get_current_weather","arguments":"{\"loc"}}]}}]}"#,
        ))
        .unwrap();
        acc.apply(event(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"ation\":\"Paris\"}"}}]},"finish_reason":"tool_calls"}]}"#,
        ))
        .unwrap();

        let calls = acc.take_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "c1");
        assert_eq!(calls[0].function.name, "get_current_weather");
        assert_eq!(calls[0].function.arguments, json!({ "location": "Paris" }));
        assert!(acc.finished);
    }

    #[test]
    fn timings_win_over_usage() {
        let mut acc = Accumulator::default();
        acc.apply(event(
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}],
                "timings":{"prompt_n":10,"prompt_ms":5.0,"predicted_n":20,"predicted_ms":1000.0}}"#,
        ))
        .unwrap();
        acc.apply(event(
            r#"{"choices":[],"usage":{"prompt_tokens":11,"completion_tokens":21}}"#,
        ))
        .unwrap();

        assert_eq!(acc.meta.prompt_eval_count, 10);
        assert_eq!(acc.meta.eval_count, 20);
        assert_eq!(acc.meta.eval_duration, 1_000_000_000);
        assert_eq!(acc.meta.tokens_per_second(), 20.0);
    }

    #[test]
    fn empty_content_is_not_a_chunk() {
        let mut acc = Accumulator::default();
        let chunk = acc
            .apply(event(r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#))
            .unwrap();
        assert!(chunk.is_none());
    }
}
