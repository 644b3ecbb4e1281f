//! `librqbit` backed swarm client.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use librqbit::api::Api;
use librqbit::{AddTorrent as RqbitAdd, AddTorrentOptions, AddTorrentResponse, Session};
use reelswarm_torrent_core::{
    AddTorrent, ClientStats, EngineEvent, EngineFile, FileStream, PlaybackLocator, RemoveTorrent,
    SwarmClient, content_type_for,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;
/// Consecutive stats failures tolerated before a torrent is reported dead.
const MAX_STATS_FAILURES: u32 = 5;

/// Swarm client driving an in-process `librqbit` session.
///
/// Metadata is fetched with a list-only add before the torrent is admitted, so
/// `Ready` is queued as soon as `add_torrent` returns. Locators point at the
/// HTTP stream route, which reads through `librqbit`'s piece-prioritising
/// file stream.
pub struct RqbitSwarmClient {
    api: Api,
    stream_url: String,
    state: Mutex<RqbitState>,
}

#[derive(Default)]
struct RqbitState {
    torrents: HashMap<Uuid, RqbitTorrent>,
    pending: Vec<EngineEvent>,
}

struct RqbitTorrent {
    engine_id: usize,
    tracker: ProgressTracker,
}

/// Stats sample reduced to what event mapping reads.
#[derive(Debug, Clone, Default, PartialEq)]
struct StatsSample {
    error: Option<String>,
    file_progress: Vec<u64>,
    download_rate: u64,
    upload_rate: u64,
}

/// Per-torrent bookkeeping between polls.
#[derive(Debug, Default)]
struct ProgressTracker {
    lengths: Vec<u64>,
    completed: bool,
    failed: bool,
    stats_failures: u32,
}

impl ProgressTracker {
    fn new(lengths: Vec<u64>) -> Self {
        Self {
            lengths,
            ..Self::default()
        }
    }

    /// Engine events for one stats poll. A finished or failed torrent yields
    /// nothing further.
    fn observe(&mut self, torrent_id: Uuid, sample: Result<StatsSample, String>) -> Vec<EngineEvent> {
        if self.completed || self.failed {
            return Vec::new();
        }
        let sample = match sample {
            Ok(sample) => {
                self.stats_failures = 0;
                sample
            }
            Err(reason) => {
                self.stats_failures += 1;
                if self.stats_failures < MAX_STATS_FAILURES {
                    debug!(%torrent_id, failures = self.stats_failures, error = %reason, "rqbit stats unavailable");
                    return Vec::new();
                }
                self.failed = true;
                return vec![EngineEvent::Error {
                    torrent_id,
                    message: format!(
                        "engine stats unavailable after {} attempts: {reason}",
                        self.stats_failures
                    ),
                }];
            }
        };

        if let Some(message) = sample.error {
            self.failed = true;
            return vec![EngineEvent::Error {
                torrent_id,
                message,
            }];
        }

        let total: u64 = self.lengths.iter().sum();
        let have: u64 = sample
            .file_progress
            .iter()
            .zip(&self.lengths)
            .map(|(done, length)| (*done).min(*length))
            .sum();
        let progress_ratio = if total == 0 {
            0.0
        } else {
            have as f64 / total as f64
        };
        let mut events = vec![EngineEvent::Progress {
            torrent_id,
            progress_ratio,
            download_rate: sample.download_rate,
            upload_rate: sample.upload_rate,
        }];
        if total > 0 && have >= total {
            self.completed = true;
            events.push(EngineEvent::Completed { torrent_id });
        }
        events
    }
}

impl RqbitSwarmClient {
    /// Create a session downloading into `default_dir` unless a request names
    /// its own directory. `stream_url` is the absolute URL of the HTTP stream
    /// route handed to playback sinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the `librqbit` session cannot start.
    pub async fn new(default_dir: PathBuf, stream_url: impl Into<String>) -> Result<Self> {
        let session = Session::new(default_dir)
            .await
            .context("failed to start rqbit session")?;
        Ok(Self {
            api: Api::new(session, None),
            stream_url: stream_url.into(),
            state: Mutex::new(RqbitState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RqbitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn engine_id(&self, id: Uuid, operation: &str) -> Result<usize> {
        self.lock()
            .torrents
            .get(&id)
            .map(|torrent| torrent.engine_id)
            .ok_or_else(|| anyhow!("unknown torrent {id} for {operation}"))
    }
}

fn join_components(components: &[String], fallback: &str) -> PathBuf {
    if components.is_empty() {
        return PathBuf::from(fallback);
    }
    components.iter().collect()
}

fn mib_to_bytes(mbps: f64) -> u64 {
    if mbps.is_finite() && mbps > 0.0 {
        (mbps * BYTES_PER_MIB) as u64
    } else {
        0
    }
}

fn stream_locator(stream_url: &str, id: Uuid) -> String {
    format!("{stream_url}?session={id}")
}

#[async_trait]
impl SwarmClient for RqbitSwarmClient {
    async fn add_torrent(&self, request: AddTorrent) -> Result<()> {
        let output_folder = request
            .download_dir
            .as_deref()
            .map(|dir| dir.join(request.id.to_string()))
            .map(|dir| dir.to_string_lossy().into_owned());

        let listing = self
            .api
            .api_add_torrent(
                RqbitAdd::from_url(request.magnet_uri.as_str()),
                Some(AddTorrentOptions {
                    list_only: true,
                    output_folder: output_folder.clone(),
                    ..Default::default()
                }),
            )
            .await
            .context("failed to fetch torrent metadata")?;
        let details = listing.details;
        let engine_files: Vec<EngineFile> = details
            .files
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, file)| {
                let path = join_components(&file.components, &file.name);
                EngineFile::new(index, path.to_string_lossy(), file.length as u64)
            })
            .collect();

        let response = self
            .api
            .session()
            .add_torrent(
                RqbitAdd::from_url(request.magnet_uri.as_str()),
                Some(AddTorrentOptions {
                    overwrite: true,
                    output_folder,
                    ..Default::default()
                }),
            )
            .await
            .context("failed to add torrent to rqbit session")?;
        let engine_id = match response {
            AddTorrentResponse::Added(id, _) | AddTorrentResponse::AlreadyManaged(id, _) => id,
            AddTorrentResponse::ListOnly(_) => {
                return Err(anyhow!("rqbit answered a download request with a listing"));
            }
        };
        info!(torrent_id = %request.id, engine_id, info_hash = %details.info_hash, "torrent added to rqbit");

        let lengths = engine_files.iter().map(|file| file.length).collect();
        let mut state = self.lock();
        state.torrents.insert(
            request.id,
            RqbitTorrent {
                engine_id,
                tracker: ProgressTracker::new(lengths),
            },
        );
        state.pending.push(EngineEvent::Ready {
            torrent_id: request.id,
            files: engine_files,
        });
        Ok(())
    }

    async fn destroy_torrent(&self, id: Uuid, options: RemoveTorrent) -> Result<()> {
        let engine_id = {
            let mut state = self.lock();
            state.pending.retain(|event| event.torrent_id() != id);
            state
                .torrents
                .remove(&id)
                .map(|torrent| torrent.engine_id)
                .ok_or_else(|| anyhow!("unknown torrent {id} for destroy"))?
        };
        if options.with_data {
            self.api
                .api_torrent_action_delete(engine_id.into())
                .await
                .context("rqbit delete failed")?;
        } else {
            self.api
                .api_torrent_action_forget(engine_id.into())
                .await
                .context("rqbit forget failed")?;
        }
        Ok(())
    }

    async fn poll_events(&self) -> Result<Vec<EngineEvent>> {
        let mut state = self.lock();
        let mut events = std::mem::take(&mut state.pending);
        for (id, torrent) in &mut state.torrents {
            let sample = self
                .api
                .api_stats_v1(torrent.engine_id.into())
                .map(|stats| {
                    let (download_rate, upload_rate) = stats.live.as_ref().map_or((0, 0), |live| {
                        (
                            mib_to_bytes(live.download_speed.mbps),
                            mib_to_bytes(live.upload_speed.mbps),
                        )
                    });
                    StatsSample {
                        error: stats.error.clone(),
                        file_progress: stats.file_progress.clone(),
                        download_rate,
                        upload_rate,
                    }
                })
                .map_err(|err| format!("{err:#}"));
            let observed = torrent.tracker.observe(*id, sample);
            if observed
                .iter()
                .any(|event| matches!(event, EngineEvent::Error { .. }))
            {
                warn!(torrent_id = %id, "rqbit reported a torrent failure");
            }
            events.extend(observed);
        }
        Ok(events)
    }

    async fn resolve_locator(&self, id: Uuid, file: &EngineFile) -> Result<PlaybackLocator> {
        self.engine_id(id, "locator")?;
        Ok(PlaybackLocator {
            uri: stream_locator(&self.stream_url, id),
            content_type: content_type_for(&file.name).to_string(),
        })
    }

    async fn open_stream(&self, id: Uuid, file: &EngineFile) -> Result<FileStream> {
        let engine_id = self.engine_id(id, "stream")?;
        let reader = self
            .api
            .api_stream(engine_id.into(), file.index)
            .with_context(|| format!("rqbit cannot stream file {}", file.index))?;
        Ok(FileStream {
            reader: Box::pin(reader),
            length: file.length,
            content_type: content_type_for(&file.name).to_string(),
        })
    }

    async fn stats(&self) -> Result<ClientStats> {
        let state = self.lock();
        let mut stats = ClientStats {
            torrents: state.torrents.len(),
            ..ClientStats::default()
        };
        for torrent in state.torrents.values() {
            if let Ok(torrent_stats) = self.api.api_stats_v1(torrent.engine_id.into())
                && let Some(live) = &torrent_stats.live
            {
                stats.download_rate += mib_to_bytes(live.download_speed.mbps);
                stats.upload_rate += mib_to_bytes(live.upload_speed.mbps);
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(file_progress: &[u64]) -> StatsSample {
        StatsSample {
            file_progress: file_progress.to_vec(),
            download_rate: 2_048,
            upload_rate: 512,
            ..StatsSample::default()
        }
    }

    #[test]
    fn components_join_into_relative_paths() {
        let joined = join_components(&["Movie".to_string(), "movie.mkv".to_string()], "ignored");
        assert_eq!(joined, PathBuf::from("Movie").join("movie.mkv"));
        assert_eq!(join_components(&[], "single.mp4"), PathBuf::from("single.mp4"));
    }

    #[test]
    fn speeds_convert_from_mebibytes() {
        assert_eq!(mib_to_bytes(1.5), 1_572_864);
        assert_eq!(mib_to_bytes(f64::NAN), 0);
        assert_eq!(mib_to_bytes(-2.0), 0);
    }

    #[test]
    fn locators_point_at_the_stream_route() {
        let id = Uuid::nil();
        assert_eq!(
            stream_locator("http://127.0.0.1:3000/api/session/stream", id),
            "http://127.0.0.1:3000/api/session/stream?session=00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn progress_ratio_sums_clamped_file_progress() {
        let id = Uuid::new_v4();
        let mut tracker = ProgressTracker::new(vec![100, 300]);
        let events = tracker.observe(id, Ok(sample(&[150, 50])));
        assert_eq!(
            events,
            [EngineEvent::Progress {
                torrent_id: id,
                progress_ratio: 0.375,
                download_rate: 2_048,
                upload_rate: 512,
            }]
        );
    }

    #[test]
    fn full_progress_completes_once() {
        let id = Uuid::new_v4();
        let mut tracker = ProgressTracker::new(vec![100, 300]);
        let events = tracker.observe(id, Ok(sample(&[100, 300])));
        assert!(matches!(events.last(), Some(EngineEvent::Completed { torrent_id }) if *torrent_id == id));
        assert!(tracker.observe(id, Ok(sample(&[100, 300]))).is_empty());
    }

    #[test]
    fn empty_listing_never_completes() {
        let id = Uuid::new_v4();
        let mut tracker = ProgressTracker::new(Vec::new());
        let events = tracker.observe(id, Ok(sample(&[])));
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            EngineEvent::Progress { progress_ratio, .. } if progress_ratio == 0.0
        ));
    }

    #[test]
    fn reported_error_becomes_an_engine_error() {
        let id = Uuid::new_v4();
        let mut tracker = ProgressTracker::new(vec![100]);
        let failed = StatsSample {
            error: Some("disk full".to_string()),
            ..sample(&[10])
        };
        assert_eq!(
            tracker.observe(id, Ok(failed)),
            [EngineEvent::Error {
                torrent_id: id,
                message: "disk full".to_string(),
            }]
        );
        assert!(tracker.observe(id, Ok(sample(&[20]))).is_empty());
    }

    #[test]
    fn repeated_stats_failures_become_an_engine_error() {
        let id = Uuid::new_v4();
        let mut tracker = ProgressTracker::new(vec![100]);
        for _ in 1..MAX_STATS_FAILURES {
            assert!(tracker.observe(id, Err("torrent not found".to_string())).is_empty());
        }
        let events = tracker.observe(id, Err("torrent not found".to_string()));
        assert!(matches!(
            &events[..],
            [EngineEvent::Error { message, .. }] if message.contains("after 5 attempts")
        ));
    }

    #[test]
    fn successful_stats_reset_the_failure_count() {
        let id = Uuid::new_v4();
        let mut tracker = ProgressTracker::new(vec![100]);
        for _ in 1..MAX_STATS_FAILURES {
            tracker.observe(id, Err("busy".to_string()));
        }
        assert_eq!(tracker.observe(id, Ok(sample(&[10]))).len(), 1);
        assert!(tracker.observe(id, Err("busy".to_string())).is_empty());
    }
}
