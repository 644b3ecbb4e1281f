//! YTS `list_movies` provider.

use async_trait::async_trait;
use reelswarm_torrent_core::{ContentKind, ContentRecord, MagnetLinkBuilder};
use serde_json::Value;
use tracing::debug;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::normalize::{QualityPreference, Variant, apply_variant, float, string_set, text, unsigned};
use crate::provider::{IndexProvider, get_json};

const DEFAULT_LANGUAGE: &str = "en";

/// Movie index backed by the YTS v2 API.
pub struct YtsProvider {
    name: String,
    base_url: String,
    kinds: Vec<ContentKind>,
    limit: u32,
    client: reqwest::Client,
    preference: QualityPreference,
    magnets: MagnetLinkBuilder,
}

impl YtsProvider {
    /// Provider named `name` rooted at `base_url` (scheme and host).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        client: reqwest::Client,
        preference: QualityPreference,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            kinds: vec![ContentKind::Movie],
            limit: 50,
            client,
            preference,
            magnets: MagnetLinkBuilder::new(),
        }
    }

    /// Override the kinds this provider answers for.
    ///
    /// YTS only lists movies, so any other kind is dropped.
    #[must_use]
    pub fn with_kinds(mut self, kinds: Vec<ContentKind>) -> Self {
        if !kinds.is_empty() {
            self.kinds = kinds
                .into_iter()
                .filter(|kind| *kind == ContentKind::Movie)
                .collect();
        }
        self
    }

    /// Page size requested from the API.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/api/v2/list_movies.json?query_term={}&page=1&limit={}&sort_by=download_count",
            self.base_url,
            urlencoding::encode(query),
            self.limit
        )
    }

    fn normalize(&self, body: &Value) -> DiscoveryResult<Vec<ContentRecord>> {
        if let Some(status) = body.get("status").and_then(Value::as_str)
            && status != "ok"
        {
            return Err(DiscoveryError::Decode {
                provider: self.name.clone(),
                reason: format!("status '{status}'"),
            });
        }

        let Some(movies) = body.pointer("/data/movies").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        Ok(movies
            .iter()
            .filter_map(|movie| {
                let record = self.normalize_movie(movie);
                if record.is_none() {
                    debug!(provider = %self.name, "skipping malformed movie entry");
                }
                record
            })
            .collect())
    }

    fn normalize_movie(&self, movie: &Value) -> Option<ContentRecord> {
        let id = text(movie.get("id"))?;
        let raw_title = text(movie.get("title"));
        let title = text(movie.get("title_english")).or_else(|| raw_title.clone())?;

        let record = ContentRecord {
            id: format!("yts_{id}"),
            title: title.clone(),
            year: unsigned(movie.get("year")).and_then(|year| u16::try_from(year).ok()),
            rating: float(movie.get("rating")),
            genres: string_set(movie.get("genres")),
            language: text(movie.get("language")).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            poster_url: text(movie.get("large_cover_image"))
                .or_else(|| text(movie.get("medium_cover_image"))),
            summary: text(movie.get("summary")).unwrap_or_default(),
            kind: ContentKind::Movie,
            ..ContentRecord::default()
        };

        let variants: Vec<Variant> = movie
            .get("torrents")
            .and_then(Value::as_array)
            .map(|torrents| torrents.iter().map(variant).collect())
            .unwrap_or_default();
        let display_name = raw_title.unwrap_or(title);
        Some(apply_variant(
            record,
            self.preference.pick(&variants),
            &display_name,
            &self.magnets,
        ))
    }
}

fn variant(torrent: &Value) -> Variant {
    Variant {
        quality: text(torrent.get("quality")),
        size: text(torrent.get("size")),
        hash: text(torrent.get("hash")),
        seeds: unsigned(torrent.get("seeds")).and_then(|seeds| u32::try_from(seeds).ok()),
    }
}

#[async_trait]
impl IndexProvider for YtsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: ContentKind) -> bool {
        self.kinds.contains(&kind)
    }

    async fn fetch(&self, query: &str) -> DiscoveryResult<Vec<ContentRecord>> {
        let body = get_json(&self.client, &self.name, &self.search_url(query)).await?;
        self.normalize(&body)
    }
}
