//! Event bus shared by the streaming session, the HTTP surface, and the CLI.
//!
//! Every state change of the single streaming session is published here as a
//! typed [`Event`] wrapped in an [`EventEnvelope`] carrying a sequential id.
//! Subscribers that reconnect (SSE clients sending `Last-Event-ID`) can replay
//! recent envelopes from a bounded ring. Delivery uses `tokio::broadcast`; a
//! slow subscriber loses the oldest events rather than stalling publishers.

#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};
use uuid::Uuid;

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Lifecycle states of the streaming session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session is active.
    #[default]
    Idle,
    /// Magnet added to the engine, waiting for metadata and peers.
    Resolving,
    /// Metadata available and a playable file selected.
    Ready,
    /// Bytes are flowing to the playback sink.
    Streaming,
    /// The swarm finished downloading the content.
    Completed,
    /// The session was cancelled by the caller.
    Stopped,
    /// The engine reported a failure or the ready deadline elapsed.
    Errored,
}

impl SessionState {
    /// Whether the state ends a session.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Errored)
    }

    /// Whether the state belongs to a session that still owns an engine torrent.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Resolving | Self::Ready | Self::Streaming)
    }

    /// Stable lowercase label, used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Ready => "ready",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        }
    }
}

/// Throughput and progress sample for the active session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct TelemetrySnapshot {
    /// Fraction of the content downloaded, always within `[0, 1]`.
    pub progress_ratio: f64,
    /// Download rate in bytes per second.
    pub download_rate: u64,
    /// Upload rate in bytes per second.
    pub upload_rate: u64,
}

/// File chosen for playback out of the torrent's file list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedFile {
    /// Position of the file in the engine's file list.
    pub index: usize,
    /// Path of the file inside the torrent.
    pub name: String,
    /// File length in bytes.
    pub size_bytes: u64,
}

/// Typed events published by the session manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new session was admitted and its magnet handed to the engine.
    SessionStarted {
        /// Session identifier (also the engine torrent id).
        session_id: Uuid,
        /// Content record the session streams.
        content_id: String,
        /// Human readable title.
        title: String,
    },
    /// The session moved to a new lifecycle state.
    StateChanged {
        /// Session identifier.
        session_id: Uuid,
        /// New state.
        state: SessionState,
        /// Reason attached to terminal states.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// A playable file was chosen once metadata arrived.
    FileSelected {
        /// Session identifier.
        session_id: Uuid,
        /// The chosen file.
        file: SelectedFile,
    },
    /// Progress and throughput sample.
    Progress {
        /// Session identifier.
        session_id: Uuid,
        /// Clamped telemetry snapshot.
        snapshot: TelemetrySnapshot,
    },
    /// The playback sink received a locator and started playing.
    PlaybackBound {
        /// Session identifier.
        session_id: Uuid,
        /// Locator handed to the sink.
        locator: String,
    },
    /// Resolving a playback locator failed. The swarm session keeps running.
    PlaybackFailed {
        /// Session identifier.
        session_id: Uuid,
        /// Failure detail.
        message: String,
    },
}

impl Event {
    /// Machine-friendly discriminator for SSE consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::StateChanged { .. } => "state_changed",
            Self::FileSelected { .. } => "file_selected",
            Self::Progress { .. } => "progress",
            Self::PlaybackBound { .. } => "playback_bound",
            Self::PlaybackFailed { .. } => "playback_failed",
        }
    }

    /// Session the event belongs to.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::StateChanged { session_id, .. }
            | Self::FileSelected { session_id, .. }
            | Self::Progress { session_id, .. }
            | Self::PlaybackBound { session_id, .. }
            | Self::PlaybackFailed { session_id, .. } => *session_id,
        }
    }
}

/// Metadata wrapper around events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// The wrapped event.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel and the replay ring share the same capacity so
    /// dropped events affect both consistently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default replay size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event, assigning it a sequential identifier.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        // No receivers is fine; the replay ring still holds the envelope.
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying buffered events newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        // Subscribe before copying the backlog so nothing published in between is lost.
        let receiver = self.sender.subscribe();
        let mut backlog = VecDeque::new();
        let mut replayed_up_to = since_id.unwrap_or(0);
        if let Some(since) = since_id {
            for item in self.buffer().iter().filter(|item| item.id > since) {
                replayed_up_to = item.id;
                backlog.push_back(item.clone());
            }
        }

        EventStream {
            backlog,
            receiver,
            skip_through: since_id.map(|_| replayed_up_to),
        }
    }

    /// Returns the last assigned identifier, if any events have been published.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.buffer().back().map(|event| event.id)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream yielding events from the replay backlog first, then live.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    skip_through: Option<EventId>,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            let envelope = match self.receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            };
            // Live copies of envelopes already served from the backlog.
            if self.skip_through.is_some_and(|seen| envelope.id <= seen) {
                continue;
            }
            return Some(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::task;
    use tokio::time::timeout;

    const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

    fn sample_progress_event(step: usize) -> Event {
        Event::Progress {
            session_id: Uuid::from_u128(7),
            snapshot: TelemetrySnapshot {
                progress_ratio: step as f64 / 1_000.0,
                download_rate: (step * 1_024) as u64,
                upload_rate: 0,
            },
        }
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for i in 0..5 {
            last_id = bus.publish(sample_progress_event(i));
        }
        assert_eq!(last_id, 5);
        assert_eq!(bus.last_event_id(), Some(5));

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(event) = stream.next().await {
                received.push(event);
            }
        }

        assert_eq!(received.len(), 3);
        assert_eq!(received.first().unwrap().id, 3);
        assert_eq!(received.last().unwrap().id, 5);
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest_entries() {
        let bus = EventBus::with_capacity(4);
        for i in 0..10 {
            bus.publish(sample_progress_event(i));
        }

        let mut stream = bus.subscribe(Some(0));
        let first = stream.next().await.expect("backlog entry");
        assert_eq!(first.id, 7);
    }

    #[tokio::test]
    async fn load_test_does_not_stall_publishers() {
        let bus = Arc::new(EventBus::with_capacity(512));
        let mut stream = bus.subscribe(None);

        let publisher = {
            let bus = bus.clone();
            task::spawn(async move {
                for i in 0..500 {
                    let publish_bus = bus.clone();
                    timeout(PUBLISH_TIMEOUT, async move {
                        publish_bus.publish(sample_progress_event(i));
                    })
                    .await
                    .expect("publish timed out");
                }
            })
        };

        let consumer = task::spawn(async move {
            let mut ids = HashSet::new();
            while ids.len() < 500 {
                if let Some(event) = stream.next().await {
                    ids.insert(event.id);
                }
            }
            ids
        });

        publisher.await.expect("publisher task panicked");
        let ids = consumer.await.expect("consumer task panicked");
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn events_serialise_with_type_tag() {
        let event = Event::StateChanged {
            session_id: Uuid::nil(),
            state: SessionState::Errored,
            message: Some("tracker unreachable".into()),
        };
        let json = serde_json::to_value(&event).expect("serialise");
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["state"], "errored");
        assert_eq!(event.kind(), "state_changed");
    }

    #[test]
    fn terminal_states_are_not_active() {
        for state in [
            SessionState::Completed,
            SessionState::Stopped,
            SessionState::Errored,
        ] {
            assert!(state.is_terminal());
            assert!(!state.is_active());
        }
        assert!(SessionState::Streaming.is_active());
        assert!(!SessionState::Idle.is_terminal());
    }
}
