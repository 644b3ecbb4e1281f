//! Generic provider for JSON indexes described by pointers.

use async_trait::async_trait;
use reelswarm_config::{JsonFieldMap, JsonProviderConfig};
use reelswarm_torrent_core::{ContentKind, ContentRecord, MagnetLinkBuilder};
use serde_json::Value;
use tracing::debug;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::normalize::{QualityPreference, Variant, apply_variant, float, string_set, text, unsigned};
use crate::provider::{IndexProvider, get_json};

/// Index whose response layout is given by a [`JsonProviderConfig`].
pub struct JsonIndexProvider {
    name: String,
    config: JsonProviderConfig,
    kinds: Vec<ContentKind>,
    client: reqwest::Client,
    preference: QualityPreference,
    magnets: MagnetLinkBuilder,
}

impl JsonIndexProvider {
    /// Provider named `name`, serving `config.kind`.
    ///
    /// Every record is stamped with `config.kind`, so entries of `kinds` naming
    /// another kind are dropped. An empty `kinds` means `config.kind`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        config: JsonProviderConfig,
        kinds: Vec<ContentKind>,
        client: reqwest::Client,
        preference: QualityPreference,
    ) -> Self {
        let kinds = if kinds.is_empty() {
            vec![config.kind]
        } else {
            kinds
                .into_iter()
                .filter(|kind| *kind == config.kind)
                .collect()
        };
        Self {
            name: name.into(),
            config,
            kinds,
            client,
            preference,
            magnets: MagnetLinkBuilder::new(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        self.config
            .url_template
            .replace("{query}", &urlencoding::encode(query))
    }

    fn normalize(&self, body: &Value) -> DiscoveryResult<Vec<ContentRecord>> {
        let results = if self.config.results_pointer.is_empty() {
            Some(body)
        } else {
            body.pointer(&self.config.results_pointer)
        };
        let items = match results {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(_) => {
                return Err(DiscoveryError::Decode {
                    provider: self.name.clone(),
                    reason: format!("'{}' is not an array", self.config.results_pointer),
                });
            }
        };

        Ok(items
            .iter()
            .filter_map(|item| {
                let record = self.normalize_item(item);
                if record.is_none() {
                    debug!(provider = %self.name, "skipping entry without a title");
                }
                record
            })
            .collect())
    }

    fn normalize_item(&self, item: &Value) -> Option<ContentRecord> {
        let fields = &self.config.fields;
        let title = text(item.pointer(&fields.title))?;
        let local_id = text(item.pointer(&fields.id)).unwrap_or_else(|| slug(&title));

        let record = ContentRecord {
            id: format!("{}_{local_id}", self.name),
            title: title.clone(),
            year: unsigned(item.pointer(&fields.year)).and_then(|year| u16::try_from(year).ok()),
            rating: float(item.pointer(&fields.rating)),
            genres: string_set(item.pointer(&fields.genres)),
            language: text(item.pointer(&fields.language)).unwrap_or_default(),
            poster_url: text(item.pointer(&fields.poster)),
            summary: text(item.pointer(&fields.summary)).unwrap_or_default(),
            kind: self.config.kind,
            ..ContentRecord::default()
        };

        let variants: Vec<Variant> = match &fields.variants {
            Some(pointer) => item
                .pointer(pointer)
                .and_then(Value::as_array)
                .map(|entries| entries.iter().map(|entry| variant(entry, fields)).collect())
                .unwrap_or_default(),
            None => vec![variant(item, fields)],
        };
        Some(apply_variant(
            record,
            self.preference.pick(&variants),
            &title,
            &self.magnets,
        ))
    }
}

fn variant(value: &Value, fields: &JsonFieldMap) -> Variant {
    Variant {
        quality: text(value.pointer(&fields.quality)),
        size: text(value.pointer(&fields.size)),
        hash: text(value.pointer(&fields.hash)),
        seeds: unsigned(value.pointer(&fields.seeds)).and_then(|seeds| u32::try_from(seeds).ok()),
    }
}

fn slug(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[async_trait]
impl IndexProvider for JsonIndexProvider {
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
