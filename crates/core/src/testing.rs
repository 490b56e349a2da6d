//! A scripted in-process provider for tests.
//!
//! Replays a fixed chunk sequence and metadata, optionally failing before
//! or after the stream starts, and counts every call so tests can assert on
//! delegation and close semantics without a network.

use crate::{
    CompletionMeta, Host, Provider, StreamCallbacks, StreamChunk, StreamRequest, cancellable,
};
use anyhow::{Result, bail};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Failure {
    BeforeStart(String),
    Midway(String),
}

/// Provider that replays a script.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    chunks: Vec<StreamChunk>,
    meta: CompletionMeta,
    failure: Option<Failure>,
    delay: Option<Duration>,
    close_error: Option<String>,
    unload_error: Option<(String, String)>,
    loaded: Mutex<Vec<String>>,
    unloaded: Mutex<Vec<String>>,
    streams: AtomicUsize,
    closes: AtomicUsize,
}

impl ScriptedProvider {
    /// A provider that completes immediately with default metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay these chunks on every stream.
    pub fn with_chunks(mut self, chunks: Vec<StreamChunk>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Complete with this metadata.
    pub fn with_meta(mut self, meta: CompletionMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Sleep this long before the first chunk.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Start with these models loaded.
    pub fn with_loaded(self, models: &[&str]) -> Self {
        *self.loaded.lock().expect("script lock poisoned") =
            models.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Fail before any callback fires.
    pub fn failing_before_start(mut self, message: &str) -> Self {
        self.failure = Some(Failure::BeforeStart(message.into()));
        self
    }

    /// Replay the chunks, complete with `done = false`, then fail.
    pub fn failing_midway(mut self, message: &str) -> Self {
        self.failure = Some(Failure::Midway(message.into()));
        self
    }

    /// Return this error from `close`.
    pub fn with_close_error(mut self, message: &str) -> Self {
        self.close_error = Some(message.into());
        self
    }

    /// Fail `unload_model` for `model` with this error, leaving it loaded.
    pub fn with_unload_error(mut self, model: &str, message: &str) -> Self {
        self.unload_error = Some((model.into(), message.into()));
        self
    }

    /// Number of `stream` calls so far.
    pub fn stream_count(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    /// Number of `close` calls so far.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Models released through `unload_model`, in call order.
    pub fn unloaded(&self) -> Vec<String> {
        self.unloaded.lock().expect("script lock poisoned").clone()
    }
}

impl Provider for ScriptedProvider {
    async fn loaded_models(&self, _host: &Host, _cancel: &CancellationToken) -> Result<Vec<String>> {
        Ok(self.loaded.lock().expect("script lock poisoned").clone())
    }

    async fn ensure_model_ready(
        &self,
        _host: &Host,
        model: &str,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        let mut loaded = self.loaded.lock().expect("script lock poisoned");
        if !loaded.iter().any(|m| m == model) {
            loaded.push(model.to_owned());
        }
        Ok(())
    }

    async fn unload_model(
        &self,
        _host: &Host,
        model: &str,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some((_, message)) = self.unload_error.as_ref().filter(|(m, _)| m == model) {
            bail!("{message}");
        }
        self.loaded
            .lock()
            .expect("script lock poisoned")
            .retain(|m| m != model);
        self.unloaded
            .lock()
            .expect("script lock poisoned")
            .push(model.to_owned());
        Ok(())
    }

    async fn stream(
        &self,
        request: StreamRequest,
        mut callbacks: StreamCallbacks<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.streams.fetch_add(1, Ordering::SeqCst);
        if let Some(Failure::BeforeStart(message)) = &self.failure {
            bail!("{message}");
        }
        if let Some(delay) = self.delay {
            cancellable(cancel, async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }

        for chunk in &self.chunks {
            callbacks.chunk(chunk);
        }

        let mut meta = self.meta.clone();
        if meta.model.is_empty() {
            meta.model = request.model;
        }
        if let Some(Failure::Midway(message)) = &self.failure {
            meta.done = false;
            callbacks.complete(&meta);
            bail!("{message}");
        }
        meta.done = true;
        callbacks.complete(&meta);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        match &self.close_error {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }
}
