//! `HostMux`: routes each call to the provider of the target host's type.

use crate::{Backend, BackendConfig, build_backend};
use anyhow::Result;
use fcore::{
    CancellationToken, Host, HostKind, Provider, ProviderError, StreamCallbacks, StreamRequest,
    normalize_kind,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Providers keyed by normalized host type.
///
/// Several keys may share one provider instance; [`close`](Provider::close)
/// still closes it once. A host with an empty type resolves to the primary
/// key, and nothing else ever falls back.
pub struct HostMux<P = Backend> {
    providers: BTreeMap<String, Arc<P>>,
    primary: String,
}

impl<P: Provider> HostMux<P> {
    /// An empty multiplexer whose primary backend is Ollama.
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
            primary: HostKind::Ollama.as_str().into(),
        }
    }

    /// Set the key an empty host type resolves to.
    pub fn with_primary(mut self, kind: &str) -> Self {
        self.primary = normalize_kind(kind);
        self
    }

    /// Register `provider` for a host type, replacing any previous one.
    pub fn register(&mut self, kind: &str, provider: Arc<P>) -> &mut Self {
        let key = normalize_kind(kind);
        tracing::debug!("registering provider for '{key}'");
        self.providers.insert(key, provider);
        self
    }

    /// Build one provider per distinct known type among `hosts`.
    ///
    /// Hosts of an unknown type are skipped with a warning; calls aimed at
    /// them fail with [`ProviderError::NoProvider`].
    pub fn build(hosts: &[Host], mut make: impl FnMut(HostKind) -> Result<P>) -> Result<Self> {
        let mut mux = Self::new();
        for host in hosts {
            let key = mux.resolve(host);
            if mux.providers.contains_key(&key) {
                continue;
            }
            match HostKind::from_key(&key) {
                Some(kind) => {
                    mux.register(kind.as_str(), Arc::new(make(kind)?));
                }
                None => tracing::warn!(
                    "host {} declares unsupported type '{}'",
                    host.label(),
                    host.kind
                ),
            }
        }
        Ok(mux)
    }

    /// The registered type keys, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    fn resolve(&self, host: &Host) -> String {
        match host.kind_key() {
            key if key.is_empty() => self.primary.clone(),
            key => key,
        }
    }

    /// The provider serving `host`.
    pub fn provider_for_host(&self, host: &Host) -> Result<&Arc<P>> {
        let key = self.resolve(host);
        self.providers.get(&key).ok_or_else(|| {
            let declared = match host.kind.trim() {
                "" => key,
                kind => kind.to_owned(),
            };
            ProviderError::NoProvider(declared).into()
        })
    }
}

impl HostMux<Backend> {
    /// Build the stock backends needed by `hosts`.
    pub fn from_hosts(hosts: &[Host], config: &BackendConfig) -> Result<Self> {
        Self::build(hosts, |kind| build_backend(kind, config))
    }
}

impl<P: Provider> Default for HostMux<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Provider> Provider for HostMux<P> {
    async fn loaded_models(&self, host: &Host, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.provider_for_host(host)?
            .loaded_models(host, cancel)
            .await
    }

    async fn ensure_model_ready(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.provider_for_host(host)?
            .ensure_model_ready(host, model, cancel)
            .await
    }

    async fn unload_model(
        &self,
        host: &Host,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.provider_for_host(host)?
            .unload_model(host, model, cancel)
            .await
    }

    async fn stream(
        &self,
        request: StreamRequest,
        callbacks: StreamCallbacks<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let provider = Arc::clone(self.provider_for_host(&request.host)?);
        provider.stream(request, callbacks, cancel).await
    }

    /// Close every distinct provider once, returning the first error.
    fn close(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut first = None;
        for (key, provider) in &self.providers {
            if !seen.insert(Arc::as_ptr(provider)) {
                continue;
            }
            if let Err(e) = provider.close() {
                tracing::warn!("closing provider for '{key}' failed: {e:#}");
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<P> std::fmt::Debug for HostMux<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostMux")
            .field("kinds", &self.providers.keys().collect::<Vec<_>>())
            .field("primary", &self.primary)
            .finish()
    }
}
