//! Errors surfaced by the session manager handle.

use reelswarm_torrent_core::TorrentError;
use thiserror::Error;

/// Failure of a manager operation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Validation or engine failure from the streaming core.
    #[error(transparent)]
    Torrent(#[from] TorrentError),
    /// The worker task has exited and no longer accepts commands.
    #[error("session worker is not running")]
    WorkerGone,
}

/// Convenience alias for manager results.
pub type SessionResult<T> = Result<T, SessionError>;
