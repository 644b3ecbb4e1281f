//! Core domain types shared across the workspace.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TorrentError;

/// Category of a discovered title.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Feature film.
    #[default]
    Movie,
    /// Episodic television.
    Tv,
    /// Animated series or film.
    Anime,
    /// Documentary.
    Documentary,
}

impl ContentKind {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Anime => "anime",
            Self::Documentary => "documentary",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = TorrentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" => Ok(Self::Movie),
            "tv" | "show" | "series" => Ok(Self::Tv),
            "anime" => Ok(Self::Anime),
            "documentary" | "documentaries" => Ok(Self::Documentary),
            other => Err(TorrentError::validation(
                "kind",
                format!("unknown content kind '{other}'"),
            )),
        }
    }
}

/// Kind restriction applied to a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    /// Query every provider.
    #[default]
    All,
    /// Query only providers serving the given kind.
    Only(ContentKind),
}

impl KindFilter {
    /// Whether a provider serving `kind` should be queried.
    #[must_use]
    pub fn admits(self, kind: ContentKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == kind,
        }
    }
}

impl FromStr for KindFilter {
    type Err = TorrentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        trimmed.parse().map(Self::Only)
    }
}

/// Normalized search result produced by the discovery aggregator.
///
/// Records are immutable once returned. A record can only start a session if
/// `magnet_uri` is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContentRecord {
    /// Provider-scoped identifier, e.g. `yts_1234`.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Release year when known.
    #[serde(default)]
    pub year: Option<u16>,
    /// Provider rating when known.
    #[serde(default)]
    pub rating: Option<f32>,
    /// Genre labels.
    #[serde(default)]
    pub genres: BTreeSet<String>,
    /// Language code.
    #[serde(default)]
    pub language: String,
    /// Cover image URL.
    #[serde(default)]
    pub poster_url: Option<String>,
    /// Plot summary, possibly empty.
    #[serde(default)]
    pub summary: String,
    /// Content category.
    #[serde(default)]
    pub kind: ContentKind,
    /// Info hash of the chosen variant.
    #[serde(default)]
    pub info_hash: Option<String>,
    /// Magnet URI of the chosen variant.
    #[serde(default)]
    pub magnet_uri: Option<String>,
    /// Seeders reported by the provider.
    #[serde(default)]
    pub seeder_count: Option<u32>,
    /// Human readable size, e.g. `1.95 GB`.
    #[serde(default)]
    pub size_label: Option<String>,
    /// Quality tier of the chosen variant, e.g. `1080p`.
    #[serde(default)]
    pub quality_label: Option<String>,
}

/// File exposed by the engine once torrent metadata is known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineFile {
    /// Position of the file within the torrent.
    pub index: usize,
    /// Relative path inside the torrent.
    pub name: String,
    /// Length in bytes.
    pub length: u64,
}

impl EngineFile {
    /// Convenience constructor.
    #[must_use]
    pub fn new(index: usize, name: impl Into<String>, length: u64) -> Self {
        Self {
            index,
            name: name.into(),
            length,
        }
    }
}

/// Request payload for admitting a magnet into the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTorrent {
    /// Identifier assigned by the session manager.
    pub id: Uuid,
    /// Magnet URI to resolve.
    pub magnet_uri: String,
    /// Friendly name to display before metadata is fetched.
    pub name_hint: Option<String>,
    /// Directory the engine should write into.
    pub download_dir: Option<PathBuf>,
}

/// Options controlling how the engine destroys a torrent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct RemoveTorrent {
    #[serde(default)]
    /// Whether to remove on-disk data alongside the torrent.
    pub with_data: bool,
}

/// Locator a media sink can play from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackLocator {
    /// URI understood by the sink (`file://`, `http://`, ...).
    pub uri: String,
    /// MIME type guessed from the file extension.
    pub content_type: String,
}

/// Client-wide throughput used by health reporting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Torrents currently held by the engine.
    pub torrents: usize,
    /// Aggregate download rate in bytes per second.
    pub download_rate: u64,
    /// Aggregate upload rate in bytes per second.
    pub upload_rate: u64,
}

/// Events emitted by an engine before the session reducer consumes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Metadata and enough peer information became available.
    Ready {
        /// Torrent identifier.
        torrent_id: Uuid,
        /// File listing in torrent order.
        files: Vec<EngineFile>,
    },
    /// Download progress sample.
    Progress {
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Raw ratio reported by the engine; not yet clamped.
        progress_ratio: f64,
        /// Download rate in bytes per second.
        download_rate: u64,
        /// Upload rate in bytes per second.
        upload_rate: u64,
    },
    /// Engine reported a failure for this torrent.
    Error {
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Human-readable failure description.
        message: String,
    },
    /// Every selected piece has been downloaded.
    Completed {
        /// Torrent identifier.
        torrent_id: Uuid,
    },
}

impl EngineEvent {
    /// Torrent the event refers to.
    #[must_use]
    pub const fn torrent_id(&self) -> Uuid {
        match self {
            Self::Ready { torrent_id, .. }
            | Self::Progress { torrent_id, .. }
            | Self::Error { torrent_id, .. }
            | Self::Completed { torrent_id } => *torrent_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_filter_parses_common_labels() {
        assert_eq!("all".parse::<KindFilter>().unwrap(), KindFilter::All);
        assert_eq!("".parse::<KindFilter>().unwrap(), KindFilter::All);
        assert_eq!(
            "Movie".parse::<KindFilter>().unwrap(),
            KindFilter::Only(ContentKind::Movie)
        );
        assert_eq!(
            "tv".parse::<KindFilter>().unwrap(),
            KindFilter::Only(ContentKind::Tv)
        );
        assert!("podcast".parse::<KindFilter>().is_err());
    }

    #[test]
    fn kind_filter_admits_matching_kinds() {
        let movies = KindFilter::Only(ContentKind::Movie);
        assert!(movies.admits(ContentKind::Movie));
        assert!(!movies.admits(ContentKind::Tv));
        assert!(KindFilter::All.admits(ContentKind::Documentary));
    }

    #[test]
    fn engine_event_uses_type_tag() {
        let torrent_id = Uuid::nil();
        let event = EngineEvent::Completed { torrent_id };
        let json = serde_json::to_value(&event).expect("serialise");
        assert_eq!(json["type"], "completed");
        assert_eq!(event.torrent_id(), torrent_id);
    }

    #[test]
    fn content_record_tolerates_sparse_json() {
        let record: ContentRecord =
            serde_json::from_str(r#"{"id":"x_1","title":"Sparse"}"#).expect("deserialise");
        assert_eq!(record.kind, ContentKind::Movie);
        assert!(record.magnet_uri.is_none());
        assert!(record.genres.is_empty());
    }
}
