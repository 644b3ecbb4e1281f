//! Error types for streaming core services.

use std::error::Error;
use std::time::Duration;

use thiserror::Error;

/// Primary error type for session and engine operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// Input rejected before any engine interaction.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// Operation failed in the underlying engine.
    #[error("engine operation {operation} failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The swarm never signalled readiness.
    #[error("swarm not ready after {}s", after.as_secs())]
    ReadyTimeout {
        /// Deadline that elapsed.
        after: Duration,
    },
    /// No playable locator could be produced for the selected file.
    #[error("playback locator unavailable: {reason}")]
    PlaybackLocator {
        /// Failure detail.
        reason: String,
    },
    /// No session is active.
    #[error("no active session")]
    NoSession,
    /// The active session has not selected a file yet.
    #[error("no file selected for playback yet")]
    FileNotSelected,
}

impl TorrentError {
    /// Shorthand for validation failures.
    #[must_use]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Wrap an engine failure.
    #[must_use]
    pub fn engine(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Engine {
            operation,
            source: source.into(),
        }
    }
}

/// Convenience alias for streaming core results.
pub type TorrentResult<T> = Result<T, TorrentError>;
