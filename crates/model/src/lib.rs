//! Backend providers for fleetbench.
//!
//! Concrete adapters for Ollama and llama.cpp, the [`Backend`] enum that
//! dispatches between them, the [`HostMux`] that routes by host type and
//! the [`Recorded`] decorator that feeds streams into the metrics
//! aggregator.

pub use {
    config::BackendConfig,
    http::HttpTransport,
    llamacpp::LlamaCpp,
    mux::HostMux,
    ollama::Ollama,
    provider::{Backend, build_backend},
    recorded::Recorded,
};

mod config;
pub mod http;
mod llamacpp;
mod mux;
mod ollama;
mod provider;
mod recorded;
