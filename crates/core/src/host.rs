//! Backend host configuration records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Known backend types.
///
/// Host types outside this set still pass through [`normalize_kind`]
/// verbatim; they only fail later if no provider is registered for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    /// Ollama server.
    Ollama,
    /// llama.cpp `llama-server` binary.
    LlamaCpp,
}

impl HostKind {
    /// The canonical registry key for this backend type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::LlamaCpp => "llamacpp",
        }
    }

    /// Resolve a normalized key to a known backend type.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ollama" => Some(Self::Ollama),
            "llamacpp" => Some(Self::LlamaCpp),
            _ => None,
        }
    }
}

impl std::fmt::Display for HostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a declared host type into a registry key.
///
/// Case-folds and trims, then collapses the spellings of one backend into
/// its canonical key. Unknown types come back trimmed and lower-cased. An
/// empty declaration stays empty; the multiplexer decides what it means.
pub fn normalize_kind(raw: &str) -> String {
    let kind = raw.trim().to_lowercase();
    match kind.as_str() {
        "ollama" => HostKind::Ollama.as_str().to_owned(),
        "llamacpp" | "llama.cpp" | "llama-cpp" | "llama_cpp" | "llama-server" => {
            HostKind::LlamaCpp.as_str().to_owned()
        }
        _ => kind,
    }
}

/// One backend inference endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Host {
    /// Base URL, e.g. `http://10.0.0.11:11434`.
    pub address: String,

    /// Declared backend type, as written in configuration.
    #[serde(default, rename = "type")]
    pub kind: String,

    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-form metadata carried along for reports.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Host {
    /// Create a host from an address and a declared type.
    pub fn new(address: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            kind: kind.into(),
            name: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The normalized registry key of the declared type.
    pub fn kind_key(&self) -> String {
        normalize_kind(&self.kind)
    }

    /// Display name, falling back to the address.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }

    /// Join an API path onto the base address.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.address.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let host = Host::new("http://localhost:11434/", "ollama");
        assert_eq!(host.url("/api/ps"), "http://localhost:11434/api/ps");
        assert_eq!(host.url("api/ps"), "http://localhost:11434/api/ps");
    }

    #[test]
    fn label_prefers_name() {
        let host = Host::new("http://a:1", "ollama");
        assert_eq!(host.label(), "http://a:1");
        assert_eq!(host.with_name("gpu-a").label(), "gpu-a");
    }
}
