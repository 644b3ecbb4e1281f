//! In-memory swarm client for tests and demo mode.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reelswarm_torrent_core::{
    AddTorrent, ClientStats, EngineEvent, EngineFile, FileStream, PlaybackLocator, RemoveTorrent,
    SwarmClient, content_type_for,
};
use uuid::Uuid;

const DEMO_DOWNLOAD_RATE: u64 = 1_572_864;
const DEMO_UPLOAD_RATE: u64 = 65_536;

/// Scriptable engine double.
///
/// Tests push engine signals with the `emit_*` helpers and inspect calls
/// afterwards. In demo mode the stub readies every torrent immediately and
/// advances progress on each poll until completion.
#[derive(Default)]
pub struct StubSwarmClient {
    state: Mutex<StubState>,
}

#[derive(Default)]
struct StubState {
    torrents: HashMap<Uuid, StubTorrent>,
    pending_events: Vec<EngineEvent>,
    add_calls: usize,
    destroyed: Vec<(Uuid, bool)>,
    fail_next_add: Option<String>,
    fail_locators: Option<String>,
    auto_ready: Option<Vec<EngineFile>>,
    demo_step: Option<f64>,
    contents: Option<Vec<u8>>,
}

struct StubTorrent {
    magnet_uri: String,
    ready: bool,
    progress: f64,
    completed: bool,
}

impl StubSwarmClient {
    /// Stub that only does what tests tell it to.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub that readies with a sample file list and downloads `step` of the
    /// content per poll.
    #[must_use]
    pub fn demo(step: f64) -> Self {
        let stub = Self::new().with_auto_ready(vec![
            EngineFile::new(0, "sample.nfo", 2_048),
            EngineFile::new(1, "feature.mp4", 734_003_200),
        ]);
        stub.lock().demo_step = Some(step.clamp(0.001, 1.0));
        stub
    }

    /// Emit `Ready` with `files` as soon as a torrent is added.
    #[must_use]
    pub fn with_auto_ready(self, files: Vec<EngineFile>) -> Self {
        self.lock().auto_ready = Some(files);
        self
    }

    /// Serve `contents` from every opened file stream.
    #[must_use]
    pub fn with_contents(self, contents: impl Into<Vec<u8>>) -> Self {
        self.lock().contents = Some(contents.into());
        self
    }

    /// Queue an arbitrary engine signal.
    pub fn push_event(&self, event: EngineEvent) {
        let mut state = self.lock();
        if let EngineEvent::Ready { torrent_id, .. } = &event
            && let Some(torrent) = state.torrents.get_mut(torrent_id)
        {
            torrent.ready = true;
        }
        state.pending_events.push(event);
    }

    /// Queue `Ready` for `torrent_id`.
    pub fn emit_ready(&self, torrent_id: Uuid, files: Vec<EngineFile>) {
        self.push_event(EngineEvent::Ready { torrent_id, files });
    }

    /// Queue a progress sample for `torrent_id`.
    pub fn emit_progress(&self, torrent_id: Uuid, progress_ratio: f64, download_rate: u64, upload_rate: u64) {
        self.push_event(EngineEvent::Progress {
            torrent_id,
            progress_ratio,
            download_rate,
            upload_rate,
        });
    }

    /// Queue an engine failure for `torrent_id`.
    pub fn emit_error(&self, torrent_id: Uuid, message: impl Into<String>) {
        self.push_event(EngineEvent::Error {
            torrent_id,
            message: message.into(),
        });
    }

    /// Queue completion for `torrent_id`.
    pub fn emit_completed(&self, torrent_id: Uuid) {
        self.push_event(EngineEvent::Completed { torrent_id });
    }

    /// Make the next `add_torrent` fail with `message`.
    pub fn fail_next_add(&self, message: impl Into<String>) {
        self.lock().fail_next_add = Some(message.into());
    }

    /// Make every locator request fail with `message`.
    pub fn fail_locators(&self, message: impl Into<String>) {
        self.lock().fail_locators = Some(message.into());
    }

    /// Number of `add_torrent` calls, successful or not.
    #[must_use]
    pub fn add_calls(&self) -> usize {
        self.lock().add_calls
    }

    /// Destroyed torrents with their `with_data` flag, in call order.
    #[must_use]
    pub fn destroyed(&self) -> Vec<(Uuid, bool)> {
        self.lock().destroyed.clone()
    }

    /// Torrents currently held by the engine.
    #[must_use]
    pub fn active_torrents(&self) -> Vec<Uuid> {
        self.lock().torrents.keys().copied().collect()
    }

    /// Magnet a torrent was added with.
    #[must_use]
    pub fn magnet_of(&self, torrent_id: Uuid) -> Option<String> {
        self.lock()
            .torrents
            .get(&torrent_id)
            .map(|torrent| torrent.magnet_uri.clone())
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StubState {
    fn advance_demo(&mut self, step: f64) {
        let mut events = Vec::new();
        for (id, torrent) in &mut self.torrents {
            if !torrent.ready || torrent.completed {
                continue;
            }
            torrent.progress = (torrent.progress + step).min(1.0);
            events.push(EngineEvent::Progress {
                torrent_id: *id,
                progress_ratio: torrent.progress,
                download_rate: DEMO_DOWNLOAD_RATE,
                upload_rate: DEMO_UPLOAD_RATE,
            });
            if torrent.progress >= 1.0 {
                torrent.completed = true;
                events.push(EngineEvent::Completed { torrent_id: *id });
            }
        }
        self.pending_events.extend(events);
    }
}

#[async_trait]
impl SwarmClient for StubSwarmClient {
    async fn add_torrent(&self, request: AddTorrent) -> Result<()> {
        let mut state = self.lock();
        state.add_calls += 1;
        if let Some(message) = state.fail_next_add.take() {
            return Err(anyhow!(message));
        }
        if state.torrents.contains_key(&request.id) {
            return Err(anyhow!("torrent {} already added", request.id));
        }

        let auto_ready = state.auto_ready.clone();
        state.torrents.insert(
            request.id,
            StubTorrent {
                magnet_uri: request.magnet_uri,
                ready: auto_ready.is_some(),
                progress: 0.0,
                completed: false,
            },
        );
        if let Some(files) = auto_ready {
            state.pending_events.push(EngineEvent::Ready {
                torrent_id: request.id,
                files,
            });
        }
        Ok(())
    }

    async fn destroy_torrent(&self, id: Uuid, options: RemoveTorrent) -> Result<()> {
        let mut state = self.lock();
        if state.torrents.remove(&id).is_none() {
            return Err(anyhow!("unknown torrent {id} for destroy"));
        }
        state.destroyed.push((id, options.with_data));
        state
            .pending_events
            .retain(|event| event.torrent_id() != id);
        Ok(())
    }

    async fn poll_events(&self) -> Result<Vec<EngineEvent>> {
        let mut state = self.lock();
        if let Some(step) = state.demo_step {
            state.advance_demo(step);
        }
        Ok(std::mem::take(&mut state.pending_events))
    }

    async fn resolve_locator(&self, id: Uuid, file: &EngineFile) -> Result<PlaybackLocator> {
        let state = self.lock();
        if let Some(message) = &state.fail_locators {
            return Err(anyhow!(message.clone()));
        }
        if !state.torrents.contains_key(&id) {
            return Err(anyhow!("unknown torrent {id} for locator"));
        }
        Ok(PlaybackLocator {
            uri: format!("stub://{id}/{}", file.index),
            content_type: content_type_for(&file.name).to_string(),
        })
    }

    async fn open_stream(&self, id: Uuid, file: &EngineFile) -> Result<FileStream> {
        let state = self.lock();
        if !state.torrents.contains_key(&id) {
            return Err(anyhow!("unknown torrent {id} for stream"));
        }
        let contents = state
            .contents
            .clone()
            .ok_or_else(|| anyhow!("no contents scripted for stub streams"))?;
        Ok(FileStream {
            length: contents.len() as u64,
            reader: Box::pin(Cursor::new(contents)),
            content_type: content_type_for(&file.name).to_string(),
        })
    }

    async fn stats(&self) -> Result<ClientStats> {
        let state = self.lock();
        let downloading = state
            .torrents
            .values()
            .filter(|torrent| torrent.ready && !torrent.completed)
            .count() as u64;
        let demo = state.demo_step.is_some();
        Ok(ClientStats {
            torrents: state.torrents.len(),
            download_rate: if demo { downloading * DEMO_DOWNLOAD_RATE } else { 0 },
            upload_rate: if demo { downloading * DEMO_UPLOAD_RATE } else { 0 },
        })
    }
}
