//! Magnet URI construction.
//!
//! Output has the shape
//! `magnet:?xt=urn:btih:<hash>&dn=<encoded name>&tr=<tracker>&tr=...` with the
//! trackers appended verbatim in a fixed order, so identical inputs always
//! produce identical strings.

use std::borrow::Cow;

use crate::error::{TorrentError, TorrentResult};

/// Public trackers appended to every magnet, in order.
pub const DEFAULT_TRACKERS: &[&str] = &[
    "udp://open.demonii.com:1337",
    "udp://tracker.openbittorrent.com:80",
    "udp://tracker.coppersurfer.tk:6969",
    "udp://glotorrents.pw:6969/announce",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://torrent.gresille.org:80/announce",
    "udp://p4p.arenabg.com:1337",
    "udp://tracker.leechers-paradise.org:6969",
];

/// Whether `hash` is a v1 info hash: 40 hex digits or 32 base32 characters.
#[must_use]
pub fn is_valid_info_hash(hash: &str) -> bool {
    match hash.len() {
        40 => hash.chars().all(|c| c.is_ascii_hexdigit()),
        32 => hash
            .chars()
            .all(|c| c.is_ascii_alphabetic() || ('2'..='7').contains(&c)),
        _ => false,
    }
}

/// Builds magnet URIs against a fixed tracker list.
#[derive(Debug, Clone)]
pub struct MagnetLinkBuilder {
    trackers: Vec<Cow<'static, str>>,
}

impl MagnetLinkBuilder {
    /// Builder using [`DEFAULT_TRACKERS`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            trackers: DEFAULT_TRACKERS.iter().copied().map(Cow::Borrowed).collect(),
        }
    }

    /// Builder using a caller supplied tracker list, kept in the given order.
    #[must_use]
    pub fn with_trackers<I, S>(trackers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trackers: trackers
                .into_iter()
                .map(|tracker| Cow::Owned(tracker.into()))
                .collect(),
        }
    }

    /// Trackers appended to each magnet.
    #[must_use]
    pub fn trackers(&self) -> impl Iterator<Item = &str> {
        self.trackers.iter().map(AsRef::as_ref)
    }

    /// Build a magnet URI for `info_hash`, labelled with `display_name`.
    ///
    /// The hash is trimmed but otherwise kept as supplied.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::Validation`] when the hash is empty or not a
    /// 40-character hex / 32-character base32 value.
    pub fn build(&self, info_hash: &str, display_name: &str) -> TorrentResult<String> {
        let hash = info_hash.trim();
        if hash.is_empty() {
            return Err(TorrentError::validation("info_hash", "must not be empty"));
        }
        if !is_valid_info_hash(hash) {
            return Err(TorrentError::validation(
                "info_hash",
                format!("'{hash}' is not a 40-char hex or 32-char base32 hash"),
            ));
        }

        let mut uri = format!(
            "magnet:?xt=urn:btih:{hash}&dn={}",
            urlencoding::encode(display_name)
        );
        for tracker in &self.trackers {
            uri.push_str("&tr=");
            uri.push_str(tracker);
        }
        Ok(uri)
    }
}

impl Default for MagnetLinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
