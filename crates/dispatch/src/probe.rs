//! The stock executor: one tool-calling chat turn per job.

use crate::{Executor, Job};
use anyhow::Result;
use fcore::{
    CancellationToken, CompletionMeta, Host, Message, Provider, StreamCallbacks, StreamRequest,
    Tool, ToolCall,
};
use futures_util::future::join_all;
use serde_json::{Value, json};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools. \
When a tool can answer the question, call it instead of guessing.";

/// A function tool that takes a single required string argument.
pub fn weather_tool(name: &str, argument: &str) -> Tool {
    Tool::function(
        name,
        "Get the current weather for a location",
        json!({
            "type": "object",
            "properties": {
                argument: {
                    "type": "string",
                    "description": "The city to get the weather for, e.g. San Francisco"
                }
            },
            "required": [argument]
        }),
    )
}

/// Asks each model one question it should answer with a tool call.
///
/// Jobs name models. `execute` readies the model on the host, streams one
/// turn and returns
/// `{model, host, message: {role, content, tool_calls}, done, metrics}`.
/// `reset` unloads every loaded model from every host, all hosts at once.
pub struct ToolCallProbe<P> {
    provider: Arc<P>,
    system: String,
    prompt: String,
    tool: Tool,
}

impl<P: Provider + 'static> ToolCallProbe<P> {
    /// Probe through `provider` with `prompt`, offering `tool`.
    pub fn new(provider: Arc<P>, prompt: impl Into<String>, tool: Tool) -> Self {
        Self {
            provider,
            system: SYSTEM_PROMPT.into(),
            prompt: prompt.into(),
            tool,
        }
    }

    /// Replace the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// The provider jobs run through.
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Unload every model on `host`, carrying on past failures.
    async fn unload_all(&self, host: &Host, cancel: &CancellationToken) -> Result<()> {
        let mut first = None;
        for model in self.provider.loaded_models(host, cancel).await? {
            tracing::debug!("unloading {model} from {}", host.label());
            if let Err(e) = self.provider.unload_model(host, &model, cancel).await {
                tracing::warn!("failed to unload {model} from {}: {e:#}", host.label());
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<P: Provider + 'static> Executor for ToolCallProbe<P> {
    async fn execute(
        &self,
        host: &Arc<Host>,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        self.provider
            .ensure_model_ready(host, &job.name, cancel)
            .await?;

        let request = StreamRequest::new(Arc::clone(host), &job.name)
            .message(Message::system(&self.system))
            .message(Message::user(&self.prompt))
            .tool(self.tool.clone());

        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut meta: Option<CompletionMeta> = None;
        let callbacks = StreamCallbacks::new()
            .on_chunk(|chunk| {
                content.push_str(&chunk.content);
                tool_calls.extend(chunk.tool_calls.iter().cloned());
            })
            .on_complete(|m| meta = Some(m.clone()));
        self.provider.stream(request, callbacks, cancel).await?;

        let meta = meta.unwrap_or_default();
        Ok(json!({
            "model": job.name,
            "host": host.address,
            "message": {
                "role": "assistant",
                "content": content,
                "tool_calls": tool_calls,
            },
            "done": meta.done,
            "metrics": meta,
        }))
    }

    async fn reset(
        &self,
        hosts: &[Arc<Host>],
        _batch: &[Job],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let outcomes = join_all(hosts.iter().map(|host| self.unload_all(host, cancel))).await;

        let mut first = None;
        for (host, outcome) in hosts.iter().zip(outcomes) {
            if let Err(e) = outcome {
                tracing::warn!("failed to reset {}: {e:#}", host.label());
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
