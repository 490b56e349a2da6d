//! Identifiable provider failures.
//!
//! Everything else travels as a plain `anyhow::Error`; callers that need to
//! branch on one of these use `downcast_ref::<ProviderError>()`.

use thiserror::Error;

/// Failures a caller may want to tell apart from transport noise.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The multiplexer has no provider for the host's normalized type.
    #[error("no provider registered for host type '{0}'")]
    NoProvider(String),

    /// The caller's cancellation token fired.
    #[error("request cancelled")]
    Cancelled,

    /// The host answered with a non-success status code.
    #[error("{host} returned status {status}: {body}")]
    Status {
        /// Host address.
        host: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The provider was closed before the call.
    #[error("provider is closed")]
    Closed,

    /// A job or readiness poll ran past its deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}
