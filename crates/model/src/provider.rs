//! Enum dispatch over the concrete backends.
//!
//! A `Backend` is chosen from the normalized host type; the multiplexer
//! holds one per type and is monomorphized on it.

use crate::{BackendConfig, LlamaCpp, Ollama};
use anyhow::Result;
use fcore::{CancellationToken, Host, HostKind, Provider, StreamCallbacks, StreamRequest};

/// One backend adapter per supported host type.
pub enum Backend {
    /// Ollama native API.
    Ollama(Ollama),
    /// llama.cpp `llama-server`.
    LlamaCpp(LlamaCpp),
}

impl Backend {
    /// The host type this backend serves.
    pub fn kind(&self) -> HostKind {
        match self {
            Self::Ollama(_) => HostKind::Ollama,
            Self::LlamaCpp(_) => HostKind::LlamaCpp,
        }
    }
}

/// Construct the backend for a host type.
pub fn build_backend(kind: HostKind, config: &BackendConfig) -> Result<Backend> {
    let backend = match kind {
        HostKind::Ollama => Backend::Ollama(Ollama::new(config)?),
        HostKind::LlamaCpp => Backend::LlamaCpp(LlamaCpp::new(config)?),
    };
    tracing::debug!("built {kind} backend");
    Ok(backend)
}

impl Provider for Backend {
    async fn loaded_models(&self, host: &Host, cancel: &CancellationToken) -> Result<Vec<String>> {
        match self {
            Self::Ollama(p) => p.loaded_models(host, cancel).await,
            Self::LlamaCpp(p) => p.loaded_models(host, cancel).await,
        }
    }

    async fn ensure_model_ready(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match self {
            Self::Ollama(p) => p.ensure_model_ready(host, model, cancel).await,
            Self::LlamaCpp(p) => p.ensure_model_ready(host, model, cancel).await,
        }
    }

    async fn unload_model(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match self {
            Self::Ollama(p) => p.unload_model(host, model, cancel).await,
            Self::LlamaCpp(p) => p.unload_model(host, model, cancel).await,
        }
    }

    async fn stream(
        &self,
        request: StreamRequest,
        callbacks: StreamCallbacks<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match self {
            Self::Ollama(p) => p.stream(request, callbacks, cancel).await,
            Self::LlamaCpp(p) => p.stream(request, callbacks, cancel).await,
        }
    }

    fn close(&self) -> Result<()> {
        match self {
            Self::Ollama(p) => p.close(),
            Self::LlamaCpp(p) => p.close(),
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}
