//! Cloneable handle to the session worker.

use std::sync::Arc;

use reelswarm_config::SessionConfig;
use reelswarm_events::{EventBus, EventId, EventStream, TelemetrySnapshot};
use reelswarm_telemetry::Metrics;
use reelswarm_torrent_core::{ClientStats, ContentRecord, FileStream, TorrentError};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use crate::command::SessionCommand;
use crate::context::EngineContext;
use crate::error::{SessionError, SessionResult};
use crate::machine::SessionSnapshot;
use crate::playback::PlaybackSink;
use crate::telemetry::{ProgressSubscription, subscribe_progress};
use crate::worker;

const COMMAND_BUFFER: usize = 128;

/// Owns the single streaming session.
///
/// All state lives in a background worker; the handle forwards requests over a
/// channel and can be cloned freely. Dropping the last handle stops the active
/// session and ends the worker.
#[derive(Clone)]
pub struct TorrentSessionManager {
    commands: mpsc::Sender<SessionCommand>,
    events: EventBus,
    context: Arc<EngineContext>,
}

impl TorrentSessionManager {
    /// Spawn the worker on the current runtime.
    #[must_use]
    pub fn spawn(context: Arc<EngineContext>, events: EventBus, config: &SessionConfig) -> Self {
        Self::launch(context, events, config, None)
    }

    /// Spawn the worker and record session metrics in `metrics`.
    #[must_use]
    pub fn spawn_with_metrics(
        context: Arc<EngineContext>,
        events: EventBus,
        config: &SessionConfig,
        metrics: Metrics,
    ) -> Self {
        Self::launch(context, events, config, Some(metrics))
    }

    fn launch(
        context: Arc<EngineContext>,
        events: EventBus,
        config: &SessionConfig,
        metrics: Option<Metrics>,
    ) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        worker::spawn(Arc::clone(&context), events.clone(), config, metrics, rx);
        Self {
            commands,
            events,
            context,
        }
    }

    /// Start streaming `record`, replacing any active session.
    ///
    /// The returned snapshot is taken right after the engine add was issued,
    /// so it normally reports `resolving`.
    ///
    /// # Errors
    ///
    /// Returns a validation error without touching the engine when the record
    /// has no usable magnet, and an engine error when the swarm client cannot
    /// be initialised.
    pub async fn start_session(&self, record: &ContentRecord) -> SessionResult<SessionSnapshot> {
        let magnet_uri = record
            .magnet_uri
            .as_deref()
            .map(str::trim)
            .filter(|magnet| !magnet.is_empty())
            .ok_or_else(|| TorrentError::validation("magnet_uri", "record has no magnet URI"))?
            .to_string();

        self.request(|respond_to| SessionCommand::Start {
            record: Box::new(record.clone()),
            magnet_uri,
            respond_to,
        })
        .await?
    }

    /// Stop the active session. Stopping while idle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerGone`] if the worker has exited.
    pub async fn stop_session(&self) -> SessionResult<SessionSnapshot> {
        self.request(|respond_to| SessionCommand::Stop { respond_to })
            .await
    }

    /// Current read model.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerGone`] if the worker has exited.
    pub async fn snapshot(&self) -> SessionResult<SessionSnapshot> {
        self.request(|respond_to| SessionCommand::Snapshot { respond_to })
            .await
    }

    /// Route playback of selected files to `sink`.
    ///
    /// If a file is already selected its locator is resolved immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerGone`] if the worker has exited.
    pub async fn bind_playback(&self, sink: Arc<dyn PlaybackSink>) -> SessionResult<()> {
        self.request(|respond_to| SessionCommand::BindPlayback { sink, respond_to })
            .await
    }

    /// Open a byte stream over the active session's selected file.
    ///
    /// When `session_id` is given it must name the active session, so a player
    /// holding a stale locator never reads another title.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NoSession`] when no matching session is active,
    /// [`TorrentError::FileNotSelected`] before metadata arrives, and an engine
    /// error when the client cannot open the file.
    pub async fn open_stream(&self, session_id: Option<Uuid>) -> SessionResult<FileStream> {
        let target = self
            .request(|respond_to| SessionCommand::StreamTarget { respond_to })
            .await?;
        let (torrent_id, selected) = target
            .filter(|(active, _)| session_id.is_none_or(|wanted| wanted == *active))
            .ok_or(TorrentError::NoSession)?;
        let file = selected.ok_or(TorrentError::FileNotSelected)?;
        let client = self
            .context
            .initialized()
            .ok_or(TorrentError::NoSession)?;
        let stream = client
            .open_stream(torrent_id, &file)
            .await
            .map_err(|err| TorrentError::engine("open_stream", err))?;
        debug!(%torrent_id, file = %file.name, length = stream.length, "stream opened");
        Ok(stream)
    }

    /// Subscribe to session events, replaying those after `since`.
    #[must_use]
    pub fn subscribe(&self, since: Option<EventId>) -> EventStream {
        self.events.subscribe(since)
    }

    /// Invoke `callback` for every published progress snapshot until the
    /// returned subscription is cancelled or dropped.
    pub fn on_progress<F>(&self, callback: F) -> ProgressSubscription
    where
        F: FnMut(TelemetrySnapshot) + Send + 'static,
    {
        subscribe_progress(&self.events, callback)
    }

    /// Aggregate engine counters; zeroes until the client has been created.
    pub async fn engine_stats(&self) -> ClientStats {
        let Some(client) = self.context.initialized() else {
            return ClientStats::default();
        };
        match client.stats().await {
            Ok(stats) => stats,
            Err(err) => {
                debug!(error = %err, "engine stats unavailable");
                ClientStats::default()
            }
        }
    }

    /// Bus the session publishes on.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> SessionResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| SessionError::WorkerGone)?;
        rx.await.map_err(|_| SessionError::WorkerGone)
    }
}
