//! Provider decorator that feeds every stream into an [`Aggregator`].

use anyhow::Result;
use fcore::{
    CancellationToken, CompletionMeta, Host, Provider, StreamCallbacks, StreamChunk,
    StreamRequest,
};
use metrics::Aggregator;
use std::sync::OnceLock;
use std::time::Instant;

/// A provider wrapper that measures time-to-first-chunk.
///
/// Delegates every [`Provider`] method to the inner provider. On `stream`
/// it latches the arrival of the first chunk and, when the stream
/// completes, records the metadata with the elapsed milliseconds (zero if
/// no chunk arrived) before the caller's own callback runs. Without an
/// aggregator it is a plain pass-through.
///
/// Nesting is safe: the outermost wrapper marks the callbacks as recorded
/// and inner wrappers forward them untouched.
pub struct Recorded<P> {
    /// The inner provider.
    pub inner: P,
    aggregator: Option<Aggregator>,
}

impl<P: Provider> Recorded<P> {
    /// Wrap `inner`, recording into `aggregator` if there is one.
    pub fn new(inner: P, aggregator: Option<Aggregator>) -> Self {
        Self { inner, aggregator }
    }

    /// The aggregator streams are recorded into.
    pub fn aggregator(&self) -> Option<&Aggregator> {
        self.aggregator.as_ref()
    }
}

impl<P: Provider> Provider for Recorded<P> {
    async fn loaded_models(&self, host: &Host, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.inner.loaded_models(host, cancel).await
    }

    async fn ensure_model_ready(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.inner.ensure_model_ready(host, model, cancel).await
    }

    async fn unload_model(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.inner.unload_model(host, model, cancel).await
    }

    async fn stream(
        &self,
        request: StreamRequest,
        callbacks: StreamCallbacks<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let aggregator = match &self.aggregator {
            Some(aggregator) if !callbacks.is_recorded() => aggregator,
            _ => return self.inner.stream(request, callbacks, cancel).await,
        };

        let started = Instant::now();
        let first_chunk = OnceLock::new();
        let first = &first_chunk;
        let (mut on_chunk, on_complete) = callbacks.into_parts();
        let wrapped = StreamCallbacks::new()
            .on_chunk(move |chunk: &StreamChunk| {
                let _ = first.set(Instant::now());
                if let Some(f) = on_chunk.as_mut() {
                    f(chunk);
                }
            })
            .on_complete(move |meta: &CompletionMeta| {
                let ttft_ms = first
                    .get()
                    .map(|at| at.duration_since(started).as_secs_f64() * 1000.0)
                    .unwrap_or(0.0);
                aggregator.record(meta, ttft_ms);
                if let Some(f) = on_complete {
                    f(meta);
                }
            })
            .recorded();

        self.inner.stream(request, wrapped, cancel).await
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for Recorded<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorded")
            .field("inner", &self.inner)
            .field("recording", &self.aggregator.is_some())
            .finish()
    }
}
