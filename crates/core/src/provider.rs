//! The provider contract every backend adapter implements.

use crate::{Host, ProviderError, StreamCallbacks, StreamRequest};
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Capability set of one backend type.
///
/// Every async operation takes the caller's cancellation token; a fired
/// token aborts in-flight network I/O and the call returns
/// [`ProviderError::Cancelled`].
///
/// Implementations are cheap to share behind an `Arc` and are never
/// constructed polymorphically; constructors are inherent methods.
pub trait Provider: Send + Sync {
    /// List the models currently loaded on `host`.
    fn loaded_models(
        &self,
        host: &Host,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Load or warm `model` on `host`. A no-op when it is already ready.
    fn ensure_model_ready(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Release `model` from `host`. A no-op for backends that cannot.
    fn unload_model(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Drive one chat exchange.
    ///
    /// Reports zero or more chunks, then completes exactly once. If the
    /// stream cannot be established the call errors without completing; if
    /// it aborts mid-flight, `complete` fires with best-effort metadata
    /// before the error is returned.
    fn stream(
        &self,
        request: StreamRequest,
        callbacks: StreamCallbacks<'_>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Release held connections. Idempotent; only the first error matters.
    fn close(&self) -> Result<()>;
}

/// Race `fut` against `cancel`, mapping cancellation to
/// [`ProviderError::Cancelled`].
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled.into()),
        result = fut => result,
    }
}
