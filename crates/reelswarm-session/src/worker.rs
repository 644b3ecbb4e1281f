use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use reelswarm_config::SessionConfig;
use reelswarm_events::{Event, EventBus};
use reelswarm_telemetry::Metrics;
use reelswarm_torrent_core::{AddTorrent, RemoveTorrent, SwarmClient};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::SessionCommand;
use crate::context::EngineContext;
use crate::machine::{Effect, SessionInput, SessionMachine, SessionPolicy};
use crate::playback::ProgressivePlaybackBridge;
use crate::telemetry::SessionTelemetryEmitter;

pub(crate) fn spawn(
    context: Arc<EngineContext>,
    events: EventBus,
    config: &SessionConfig,
    metrics: Option<Metrics>,
    mut commands: mpsc::Receiver<SessionCommand>,
) {
    let poll_interval = config.poll_interval();
    let policy = SessionPolicy {
        ready_timeout: config.ready_timeout(),
        remove_data_on_stop: config.remove_data_on_stop,
    };
    let telemetry_interval = config.telemetry_interval();
    let download_dir = config.download_dir.clone();

    tokio::spawn(async move {
        let (feedback, mut feedback_rx) = mpsc::unbounded_channel();
        let mut worker = Worker {
            context,
            client: None,
            events,
            metrics,
            machine: SessionMachine::new(policy),
            emitter: SessionTelemetryEmitter::new(telemetry_interval),
            bridge: ProgressivePlaybackBridge::default(),
            download_dir,
            feedback,
            deadline: None,
            locator: None,
        };
        let mut poll = tokio::time::interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => worker.handle(command).await,
                        None => break,
                    }
                }
                Some(input) = feedback_rx.recv() => worker.dispatch(input).await,
                _ = poll.tick() => worker.poll_engine().await,
            }
        }

        // Every handle is gone; release the engine torrent before exiting.
        worker.dispatch(SessionInput::Stopped).await;
        debug!("session worker stopped");
    });
}

struct Worker {
    context: Arc<EngineContext>,
    client: Option<Arc<dyn SwarmClient>>,
    events: EventBus,
    metrics: Option<Metrics>,
    machine: SessionMachine,
    emitter: SessionTelemetryEmitter,
    bridge: ProgressivePlaybackBridge,
    download_dir: PathBuf,
    feedback: mpsc::UnboundedSender<SessionInput>,
    deadline: Option<JoinHandle<()>>,
    locator: Option<JoinHandle<()>>,
}

impl Worker {
    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start {
                record,
                magnet_uri,
                respond_to,
            } => {
                if let Err(err) = self.ensure_client().await {
                    let _ = respond_to.send(Err(err.into()));
                    return;
                }
                let torrent_id = Uuid::new_v4();
                info!(
                    session_id = %torrent_id,
                    content_id = %record.id,
                    title = %record.title,
                    "starting session"
                );
                self.dispatch(SessionInput::Started {
                    torrent_id,
                    content_id: record.id,
                    title: record.title,
                    magnet_uri,
                })
                .await;
                let _ = respond_to.send(Ok(self.machine.snapshot()));
            }
            SessionCommand::Stop { respond_to } => {
                self.dispatch(SessionInput::Stopped).await;
                let _ = respond_to.send(self.machine.snapshot());
            }
            SessionCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.machine.snapshot());
            }
            SessionCommand::StreamTarget { respond_to } => {
                let target = self
                    .machine
                    .active_torrent()
                    .map(|torrent_id| (torrent_id, self.machine.selected().cloned()));
                let _ = respond_to.send(target);
            }
            SessionCommand::BindPlayback { sink, respond_to } => {
                self.bridge.register(sink);
                self.dispatch(SessionInput::SinkRegistered).await;
                let _ = respond_to.send(());
            }
        }
    }

    async fn ensure_client(&mut self) -> reelswarm_torrent_core::TorrentResult<()> {
        if self.client.is_none() {
            self.client = Some(self.context.client().await?);
        }
        Ok(())
    }

    /// Reduce `input` and execute the resulting effects, feeding follow-up
    /// inputs back through the reducer until none remain.
    async fn dispatch(&mut self, input: SessionInput) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            for effect in self.machine.reduce(input) {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    async fn execute(&mut self, effect: Effect) -> Option<SessionInput> {
        match effect {
            Effect::Publish(event) => {
                self.events.publish(event);
            }
            Effect::AddTorrent {
                epoch,
                torrent_id,
                magnet_uri,
                name_hint,
            } => {
                let Some(client) = self.client.clone() else {
                    return Some(SessionInput::Added {
                        epoch,
                        torrent_id,
                        result: Err("swarm client unavailable".to_string()),
                    });
                };
                let request = AddTorrent {
                    id: torrent_id,
                    magnet_uri,
                    name_hint: Some(name_hint),
                    download_dir: Some(self.download_dir.clone()),
                };
                let feedback = self.feedback.clone();
                tokio::spawn(async move {
                    let result = client
                        .add_torrent(request)
                        .await
                        .map_err(|err| format!("{err:#}"));
                    let _ = feedback.send(SessionInput::Added {
                        epoch,
                        torrent_id,
                        result,
                    });
                });
            }
            Effect::DestroyTorrent {
                torrent_id,
                with_data,
            } => {
                if let Some(client) = &self.client {
                    match client
                        .destroy_torrent(torrent_id, RemoveTorrent { with_data })
                        .await
                    {
                        Ok(()) => info!(%torrent_id, with_data, "engine torrent destroyed"),
                        Err(err) => warn!(%torrent_id, error = %err, "failed to destroy engine torrent"),
                    }
                }
            }
            Effect::ArmReadyDeadline { epoch, after } => {
                self.cancel_deadline();
                let feedback = self.feedback.clone();
                self.deadline = Some(tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = feedback.send(SessionInput::ReadyDeadline { epoch });
                }));
            }
            Effect::CancelReadyDeadline => self.cancel_deadline(),
            Effect::ResolveLocator {
                epoch,
                torrent_id,
                file,
            } => {
                let client = self.client.clone()?;
                self.cancel_locator();
                let feedback = self.feedback.clone();
                self.locator = Some(tokio::spawn(async move {
                    let result = client
                        .resolve_locator(torrent_id, &file)
                        .await
                        .map_err(|err| format!("{err:#}"));
                    let _ = feedback.send(SessionInput::Locator { epoch, result });
                }));
            }
            Effect::BindSink { epoch, locator } => {
                if !self.bridge.has_sink() {
                    debug!(uri = %locator.uri, "locator resolved without a sink");
                    return None;
                }
                return Some(match self.bridge.bind(&locator) {
                    Ok(()) => SessionInput::PlaybackBound { epoch, locator },
                    Err(err) => {
                        warn!(error = %err, "playback sink refused locator");
                        SessionInput::PlaybackFailed {
                            epoch,
                            message: format!("playback sink refused the locator: {err:#}"),
                        }
                    }
                });
            }
            Effect::DetachSink => {
                self.cancel_locator();
                self.bridge.detach();
            }
            Effect::Telemetry {
                session_id,
                snapshot,
                force,
            } => {
                if self.emitter.admit(Instant::now(), force) {
                    self.events.publish(Event::Progress {
                        session_id,
                        snapshot,
                    });
                    if let Some(metrics) = &self.metrics {
                        metrics.observe_rates(snapshot.download_rate, snapshot.upload_rate);
                    }
                }
            }
            Effect::SessionBegan => {
                self.emitter.reset();
                if let Some(metrics) = &self.metrics {
                    metrics.session_started();
                }
            }
            Effect::SessionEnded { outcome } => {
                info!(outcome = outcome.as_str(), epoch = self.machine.epoch(), "session ended");
                if let Some(metrics) = &self.metrics {
                    metrics.session_ended(outcome.as_str());
                }
            }
        }
        None
    }

    async fn poll_engine(&mut self) {
        if self.machine.active_torrent().is_none() {
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };
        match client.poll_events().await {
            Ok(events) => {
                for event in events {
                    let epoch = self.machine.epoch();
                    self.dispatch(SessionInput::Engine { epoch, event }).await;
                }
            }
            Err(err) => warn!(error = %err, "engine event polling failed"),
        }
    }

    fn cancel_deadline(&mut self) {
        if let Some(handle) = self.deadline.take() {
            handle.abort();
        }
    }

    fn cancel_locator(&mut self) {
        if let Some(handle) = self.locator.take() {
            handle.abort();
        }
    }
}
