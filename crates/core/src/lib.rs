//! Core types and the provider contract shared by every fleetbench crate.
//!
//! A [`Host`] is one inference endpoint with a declared backend type. A
//! [`Provider`] adapts one backend type's wire format to a single streaming
//! contract: [`StreamRequest`] in, zero or more [`StreamChunk`]s and exactly
//! one [`CompletionMeta`] out through [`StreamCallbacks`].

pub use {
    error::ProviderError,
    host::{Host, HostKind, normalize_kind},
    message::{Message, Role},
    provider::{Provider, cancellable},
    request::StreamRequest,
    response::CompletionMeta,
    stream::{OnChunk, OnComplete, StreamCallbacks, StreamChunk},
    tool::{FunctionCall, Tool, ToolCall},
};
pub use tokio_util::sync::CancellationToken;

mod error;
mod host;
mod message;
mod provider;
mod request;
mod response;
mod stream;
#[cfg(feature = "test-utils")]
pub mod testing;
mod tool;
