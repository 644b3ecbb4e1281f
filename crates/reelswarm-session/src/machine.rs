//! Session state machine.
//!
//! [`SessionMachine::reduce`] is the only place session state changes. It is
//! synchronous and performs no I/O: every side effect is returned as an
//! [`Effect`] for the worker to execute, in order. Asynchronous results (engine
//! adds, ready deadlines, locator resolution) come back as inputs tagged with
//! the epoch that requested them; inputs from an older epoch are dropped.

use std::time::Duration;

use reelswarm_events::{Event, SelectedFile, SessionState, TelemetrySnapshot};
use reelswarm_torrent_core::{EngineEvent, EngineFile, PlaybackLocator, TorrentError, select_media_file};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::telemetry::clamp_ratio;

const SUPERSEDED: &str = "superseded by a new session";

/// Knobs the reducer needs from configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// How long to wait for the swarm to become ready; `None` waits forever.
    pub ready_timeout: Option<Duration>,
    /// Whether stop and error teardown delete downloaded data.
    pub remove_data_on_stop: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ready_timeout: Some(Duration::from_secs(90)),
            remove_data_on_stop: true,
        }
    }
}

/// Everything the reducer consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// A validated record should start streaming, replacing any active session.
    Started {
        /// Identifier for the new session and its engine torrent.
        torrent_id: Uuid,
        /// Content record id.
        content_id: String,
        /// Display title.
        title: String,
        /// Magnet handed to the engine.
        magnet_uri: String,
    },
    /// The engine finished admitting a torrent.
    Added {
        /// Epoch of the start that requested the add.
        epoch: u64,
        /// Torrent that was added.
        torrent_id: Uuid,
        /// Engine failure, if any.
        result: Result<(), String>,
    },
    /// Signal drained from the engine.
    Engine {
        /// Epoch current when the signal was polled.
        epoch: u64,
        /// The signal.
        event: EngineEvent,
    },
    /// The ready deadline armed for `epoch` elapsed.
    ReadyDeadline {
        /// Epoch that armed the deadline.
        epoch: u64,
    },
    /// Locator resolution finished.
    Locator {
        /// Epoch that requested the locator.
        epoch: u64,
        /// Resolved locator or failure detail.
        result: Result<PlaybackLocator, String>,
    },
    /// The sink accepted the locator and started playing.
    PlaybackBound {
        /// Epoch the locator belongs to.
        epoch: u64,
        /// Locator now playing.
        locator: PlaybackLocator,
    },
    /// The sink refused the locator.
    PlaybackFailed {
        /// Epoch the locator belongs to.
        epoch: u64,
        /// Failure detail.
        message: String,
    },
    /// A playback sink was registered.
    SinkRegistered,
    /// The caller asked to stop the active session.
    Stopped,
}

/// Side effects requested by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Publish an event on the bus.
    Publish(Event),
    /// Add the magnet to the engine off the worker loop.
    AddTorrent {
        /// Epoch of the requesting start.
        epoch: u64,
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Magnet to add.
        magnet_uri: String,
        /// Name shown before metadata arrives.
        name_hint: String,
    },
    /// Destroy an engine torrent; the client itself stays up.
    DestroyTorrent {
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Delete downloaded data as well.
        with_data: bool,
    },
    /// Start the ready deadline timer.
    ArmReadyDeadline {
        /// Epoch the timer reports back with.
        epoch: u64,
        /// Delay before firing.
        after: Duration,
    },
    /// Abort the running ready deadline timer, if any.
    CancelReadyDeadline,
    /// Ask the engine for a playable locator of `file`.
    ResolveLocator {
        /// Epoch the result reports back with.
        epoch: u64,
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Selected file.
        file: EngineFile,
    },
    /// Attach the locator to the registered sink and start playback.
    BindSink {
        /// Epoch the outcome reports back with.
        epoch: u64,
        /// Locator to attach.
        locator: PlaybackLocator,
    },
    /// Release the sink and abort pending locator work.
    DetachSink,
    /// Offer a progress sample to the telemetry emitter.
    Telemetry {
        /// Session identifier.
        session_id: Uuid,
        /// Clamped sample.
        snapshot: TelemetrySnapshot,
        /// Publish regardless of the sampling interval.
        force: bool,
    },
    /// A session began.
    SessionBegan,
    /// A session reached a terminal state.
    SessionEnded {
        /// Terminal state reached.
        outcome: SessionState,
    },
}

/// Read model of the manager, served to callers and the HTTP surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionSnapshot {
    /// Current lifecycle state.
    pub state: SessionState,
    /// Number of sessions started so far.
    pub epoch: u64,
    /// Active session id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Active content record id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    /// Active title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// File chosen for playback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_file: Option<SelectedFile>,
    /// Latest progress sample.
    pub telemetry: TelemetrySnapshot,
    /// Locator currently attached to the sink.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_uri: Option<String>,
    /// Terminal state of the previous session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<SessionState>,
    /// Message attached to the previous terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    torrent_id: Uuid,
    content_id: String,
    title: String,
    state: SessionState,
    selected: Option<EngineFile>,
    telemetry: TelemetrySnapshot,
    playback_uri: Option<String>,
}

/// Finite-state machine for the single streaming session.
#[derive(Debug, Default)]
pub struct SessionMachine {
    policy: SessionPolicy,
    epoch: u64,
    active: Option<ActiveSession>,
    sink_registered: bool,
    last_outcome: Option<SessionState>,
    last_message: Option<String>,
}

impl SessionMachine {
    /// Idle machine.
    #[must_use]
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Current epoch; bumped by every start.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.active
            .as_ref()
            .map_or(SessionState::Idle, |session| session.state)
    }

    /// Engine torrent owned by the active session.
    #[must_use]
    pub fn active_torrent(&self) -> Option<Uuid> {
        self.active.as_ref().map(|session| session.torrent_id)
    }

    /// File chosen for playback in the active session.
    #[must_use]
    pub fn selected(&self) -> Option<&EngineFile> {
        self.active.as_ref().and_then(|session| session.selected.as_ref())
    }

    /// Read model for callers.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot {
            state: self.state(),
            epoch: self.epoch,
            last_outcome: self.last_outcome,
            message: self.last_message.clone(),
            ..SessionSnapshot::default()
        };
        if let Some(session) = &self.active {
            snapshot.session_id = Some(session.torrent_id);
            snapshot.content_id = Some(session.content_id.clone());
            snapshot.title = Some(session.title.clone());
            snapshot.selected_file = session.selected.as_ref().map(selected_file);
            snapshot.telemetry = session.telemetry;
            snapshot.playback_uri.clone_from(&session.playback_uri);
        }
        snapshot
    }

    /// Apply one input and return the effects to execute, in order.
    pub fn reduce(&mut self, input: SessionInput) -> Vec<Effect> {
        let mut effects = Vec::new();
        match input {
            SessionInput::Started {
                torrent_id,
                content_id,
                title,
                magnet_uri,
            } => self.start(torrent_id, content_id, title, magnet_uri, &mut effects),
            SessionInput::Added {
                epoch,
                torrent_id,
                result,
            } => self.on_added(epoch, torrent_id, result, &mut effects),
            SessionInput::Engine { epoch, event } => {
                if self.is_current(epoch) && self.active_torrent() == Some(event.torrent_id()) {
                    self.on_engine(event, &mut effects);
                } else {
                    debug!(epoch, torrent_id = %event.torrent_id(), "discarding stale engine event");
                }
            }
            SessionInput::ReadyDeadline { epoch } => {
                if self.is_current(epoch) && self.state() == SessionState::Resolving {
                    let after = self.policy.ready_timeout.unwrap_or_default();
                    let message = TorrentError::ReadyTimeout { after }.to_string();
                    self.teardown(SessionState::Errored, Some(message), true, &mut effects);
                }
            }
            SessionInput::Locator { epoch, result } => {
                if self.is_current(epoch) && self.is_playable() {
                    self.on_locator(epoch, result, &mut effects);
                } else {
                    debug!(epoch, "discarding stale locator");
                }
            }
            SessionInput::PlaybackBound { epoch, locator } => {
                if self.is_current(epoch) {
                    self.on_bound(locator, &mut effects);
                }
            }
            SessionInput::PlaybackFailed { epoch, message } => {
                if let Some(session) = self.active.as_ref().filter(|_| self.is_current(epoch)) {
                    effects.push(Effect::Publish(Event::PlaybackFailed {
                        session_id: session.torrent_id,
                        message,
                    }));
                }
            }
            SessionInput::SinkRegistered => {
                self.sink_registered = true;
                self.request_locator(&mut effects);
            }
            SessionInput::Stopped => {
                if self.active.is_some() {
                    self.teardown(SessionState::Stopped, None, true, &mut effects);
                }
            }
        }
        effects
    }

    fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch && self.active.is_some()
    }

    fn is_playable(&self) -> bool {
        matches!(self.state(), SessionState::Ready | SessionState::Streaming)
    }

    fn start(
        &mut self,
        torrent_id: Uuid,
        content_id: String,
        title: String,
        magnet_uri: String,
        effects: &mut Vec<Effect>,
    ) {
        if self.active.is_some() {
            self.teardown(
                SessionState::Stopped,
                Some(SUPERSEDED.to_string()),
                true,
                effects,
            );
        }

        self.epoch += 1;
        self.last_outcome = None;
        self.last_message = None;
        effects.push(Effect::SessionBegan);
        effects.push(Effect::Publish(Event::SessionStarted {
            session_id: torrent_id,
            content_id: content_id.clone(),
            title: title.clone(),
        }));
        effects.push(state_changed(torrent_id, SessionState::Resolving, None));
        effects.push(Effect::AddTorrent {
            epoch: self.epoch,
            torrent_id,
            magnet_uri,
            name_hint: title.clone(),
        });
        if let Some(after) = self.policy.ready_timeout {
            effects.push(Effect::ArmReadyDeadline {
                epoch: self.epoch,
                after,
            });
        }

        self.active = Some(ActiveSession {
            torrent_id,
            content_id,
            title,
            state: SessionState::Resolving,
            selected: None,
            telemetry: TelemetrySnapshot::default(),
            playback_uri: None,
        });
    }

    fn on_added(
        &mut self,
        epoch: u64,
        torrent_id: Uuid,
        result: Result<(), String>,
        effects: &mut Vec<Effect>,
    ) {
        let owned = self.is_current(epoch) && self.active_torrent() == Some(torrent_id);
        match (owned, result) {
            (true, Ok(())) => {}
            (true, Err(message)) => {
                let message = format!("engine rejected the magnet: {message}");
                self.teardown(SessionState::Errored, Some(message), false, effects);
            }
            (false, Ok(())) => {
                debug!(%torrent_id, "destroying torrent added after its session ended");
                effects.push(Effect::DestroyTorrent {
                    torrent_id,
                    with_data: self.policy.remove_data_on_stop,
                });
            }
            (false, Err(_)) => {}
        }
    }

    fn on_engine(&mut self, event: EngineEvent, effects: &mut Vec<Effect>) {
        let state = self.state();
        match event {
            EngineEvent::Ready { files, .. } if state == SessionState::Resolving => {
                let Some(file) = select_media_file(&files).cloned() else {
                    self.teardown(
                        SessionState::Errored,
                        Some("torrent contains no files".to_string()),
                        true,
                        effects,
                    );
                    return;
                };
                let Some(session) = self.active.as_mut() else {
                    return;
                };
                session.state = SessionState::Ready;
                session.selected = Some(file.clone());
                let session_id = session.torrent_id;
                effects.push(Effect::CancelReadyDeadline);
                effects.push(Effect::Publish(Event::FileSelected {
                    session_id,
                    file: selected_file(&file),
                }));
                effects.push(state_changed(session_id, SessionState::Ready, None));
                self.request_locator(effects);
            }
            EngineEvent::Progress {
                progress_ratio,
                download_rate,
                upload_rate,
                ..
            } if self.is_playable() => {
                let snapshot = TelemetrySnapshot {
                    progress_ratio: clamp_ratio(progress_ratio),
                    download_rate,
                    upload_rate,
                };
                if let Some(session) = self.active.as_mut() {
                    session.telemetry = snapshot;
                    effects.push(Effect::Telemetry {
                        session_id: session.torrent_id,
                        snapshot,
                        force: false,
                    });
                }
                self.enter_streaming(effects);
            }
            EngineEvent::Error { message, .. } => {
                self.teardown(SessionState::Errored, Some(message), true, effects);
            }
            EngineEvent::Completed { .. } if self.is_playable() => {
                if let Some(session) = self.active.as_mut() {
                    session.telemetry.progress_ratio = 1.0;
                    effects.push(Effect::Telemetry {
                        session_id: session.torrent_id,
                        snapshot: session.telemetry,
                        force: true,
                    });
                }
                self.teardown(SessionState::Completed, None, true, effects);
            }
            other => {
                debug!(state = state.as_str(), event = ?other, "engine event ignored in current state");
            }
        }
    }

    fn on_locator(
        &mut self,
        epoch: u64,
        result: Result<PlaybackLocator, String>,
        effects: &mut Vec<Effect>,
    ) {
        match result {
            Ok(locator) => effects.push(Effect::BindSink { epoch, locator }),
            Err(reason) => {
                if let Some(session) = &self.active {
                    effects.push(Effect::Publish(Event::PlaybackFailed {
                        session_id: session.torrent_id,
                        message: TorrentError::PlaybackLocator { reason }.to_string(),
                    }));
                }
            }
        }
    }

    fn on_bound(&mut self, locator: PlaybackLocator, effects: &mut Vec<Effect>) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        session.playback_uri = Some(locator.uri.clone());
        effects.push(Effect::Publish(Event::PlaybackBound {
            session_id: session.torrent_id,
            locator: locator.uri,
        }));
        self.enter_streaming(effects);
    }

    fn enter_streaming(&mut self, effects: &mut Vec<Effect>) {
        if let Some(session) = self.active.as_mut()
            && session.state == SessionState::Ready
        {
            session.state = SessionState::Streaming;
            effects.push(state_changed(
                session.torrent_id,
                SessionState::Streaming,
                None,
            ));
        }
    }

    fn request_locator(&self, effects: &mut Vec<Effect>) {
        if !self.sink_registered || !self.is_playable() {
            return;
        }
        if let Some(session) = &self.active
            && let Some(file) = &session.selected
        {
            effects.push(Effect::ResolveLocator {
                epoch: self.epoch,
                torrent_id: session.torrent_id,
                file: file.clone(),
            });
        }
    }

    fn teardown(
        &mut self,
        outcome: SessionState,
        message: Option<String>,
        destroy: bool,
        effects: &mut Vec<Effect>,
    ) {
        let Some(session) = self.active.take() else {
            return;
        };
        effects.push(Effect::CancelReadyDeadline);
        effects.push(state_changed(session.torrent_id, outcome, message.clone()));
        if destroy {
            effects.push(Effect::DestroyTorrent {
                torrent_id: session.torrent_id,
                with_data: outcome != SessionState::Completed && self.policy.remove_data_on_stop,
            });
        }
        effects.push(Effect::DetachSink);
        effects.push(state_changed(session.torrent_id, SessionState::Idle, None));
        effects.push(Effect::SessionEnded { outcome });
        self.last_outcome = Some(outcome);
        self.last_message = message;
    }
}

fn state_changed(session_id: Uuid, state: SessionState, message: Option<String>) -> Effect {
    Effect::Publish(Event::StateChanged {
        session_id,
        state,
        message,
    })
}

fn selected_file(file: &EngineFile) -> SelectedFile {
    SelectedFile {
        index: file.index,
        name: file.name.clone(),
        size_bytes: file.length,
    }
}
