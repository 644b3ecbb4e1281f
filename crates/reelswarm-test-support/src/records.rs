//! Content records and engine file lists.

use reelswarm_torrent_core::{ContentKind, ContentRecord, EngineFile, MagnetLinkBuilder};

use crate::fixtures::INCEPTION_HASH;

/// Record with a valid magnet, ready to start a session.
#[must_use]
pub fn streamable_record() -> ContentRecord {
    let magnet_uri = MagnetLinkBuilder::new()
        .build(INCEPTION_HASH, "Inception")
        .ok();
    ContentRecord {
        id: "yts_3175".to_string(),
        title: "Inception".to_string(),
        year: Some(2010),
        kind: ContentKind::Movie,
        info_hash: Some(INCEPTION_HASH.to_string()),
        magnet_uri,
        quality_label: Some("720p".to_string()),
        ..ContentRecord::default()
    }
}

/// Record without a magnet; starting it must be rejected.
#[must_use]
pub fn record_without_magnet() -> ContentRecord {
    ContentRecord {
        id: "scrape_1".to_string(),
        title: "No Magnet".to_string(),
        ..ContentRecord::default()
    }
}

/// Files in torrent order, built from `(name, length)` pairs.
#[must_use]
pub fn engine_files(entries: &[(&str, u64)]) -> Vec<EngineFile> {
    entries
        .iter()
        .enumerate()
        .map(|(index, (name, length))| EngineFile::new(index, *name, *length))
        .collect()
}
