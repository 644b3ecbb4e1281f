//! Per-provider failures. These never escape an aggregated search.

use thiserror::Error;

/// Failure of a single provider call.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Transport failure or client-side timeout.
    #[error("request to {provider} failed")]
    Request {
        /// Provider name.
        provider: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// Provider answered with a non-success status.
    #[error("{provider} answered with status {status}")]
    Status {
        /// Provider name.
        provider: String,
        /// HTTP status code.
        status: u16,
    },
    /// Body was not the expected JSON shape.
    #[error("{provider} returned an unexpected payload: {reason}")]
    Decode {
        /// Provider name.
        provider: String,
        /// What was wrong.
        reason: String,
    },
}

/// Convenience alias for provider results.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
