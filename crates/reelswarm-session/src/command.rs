use std::sync::Arc;

use reelswarm_torrent_core::{ContentRecord, EngineFile};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::SessionResult;
use crate::machine::SessionSnapshot;
use crate::playback::PlaybackSink;

/// Requests sent from [`TorrentSessionManager`](crate::TorrentSessionManager)
/// handles to the worker task.
pub(crate) enum SessionCommand {
    /// Start streaming a validated record.
    Start {
        record: Box<ContentRecord>,
        magnet_uri: String,
        respond_to: oneshot::Sender<SessionResult<SessionSnapshot>>,
    },
    /// Stop the active session, if any.
    Stop {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
    /// Read the current snapshot.
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
    /// Active torrent and its selected file, if any.
    StreamTarget {
        respond_to: oneshot::Sender<Option<(Uuid, Option<EngineFile>)>>,
    },
    /// Register the sink playback is bound to.
    BindPlayback {
        sink: Arc<dyn PlaybackSink>,
        respond_to: oneshot::Sender<()>,
    },
}
