#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! Engine-agnostic streaming interfaces and DTOs.
//!
//! Layout:
//! - `model/`: content records, engine files, the engine event union.
//! - `service/`: the [`SwarmClient`] seam implemented by engine adapters.
//! - `magnet.rs`: magnet URI construction from an info hash.
//! - `selector.rs`: playable-file selection once metadata arrives.
//! - `error.rs`: shared error type.

pub mod error;
pub mod magnet;
pub mod model;
pub mod selector;
pub mod service;

pub use error::{TorrentError, TorrentResult};
pub use magnet::{DEFAULT_TRACKERS, MagnetLinkBuilder, is_valid_info_hash};
pub use model::{
    AddTorrent, ClientStats, ContentKind, ContentRecord, EngineEvent, EngineFile, KindFilter,
    PlaybackLocator, RemoveTorrent,
};
pub use reelswarm_events::{SelectedFile, SessionState, TelemetrySnapshot};
pub use selector::{PLAYABLE_EXTENSIONS, content_type_for, select_media_file};
pub use service::{ByteSource, FileStream, SwarmClient};
