//! Lenient JSON extraction shared by providers.
//!
//! Provider payloads are untrusted: numbers arrive as strings, arrays as
//! `null`, fields go missing. Every accessor returns `None` instead of failing
//! so a single odd field never drops a record.

use std::collections::BTreeSet;

use reelswarm_torrent_core::{ContentRecord, MagnetLinkBuilder};
use serde_json::Value;
use tracing::debug;

/// Non-empty trimmed string, or a number rendered as a string.
pub(crate) fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Unsigned integer from a number or numeric string.
pub(crate) fn unsigned(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// Float from a number or numeric string.
pub(crate) fn float(value: Option<&Value>) -> Option<f32> {
    match value? {
        Value::Number(number) => number.as_f64().map(|f| f as f32),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// Set of non-empty strings from an array; anything else yields an empty set.
pub(crate) fn string_set(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|item| text(Some(item))).collect())
        .unwrap_or_default()
}

/// One downloadable variant of a title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Variant {
    pub(crate) quality: Option<String>,
    pub(crate) size: Option<String>,
    pub(crate) hash: Option<String>,
    pub(crate) seeds: Option<u32>,
}

/// Ordered quality tiers; the first variant wins when no tier matches.
#[derive(Debug, Clone, Default)]
pub struct QualityPreference {
    tiers: Vec<String>,
}

impl QualityPreference {
    /// Preference over `tiers`, best first.
    #[must_use]
    pub fn new<I, S>(tiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tiers: tiers.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn pick<'a>(&self, variants: &'a [Variant]) -> Option<&'a Variant> {
        self.tiers
            .iter()
            .find_map(|tier| {
                variants.iter().find(|variant| {
                    variant
                        .quality
                        .as_deref()
                        .is_some_and(|quality| quality.eq_ignore_ascii_case(tier))
                })
            })
            .or_else(|| variants.first())
    }
}

/// Copy the chosen variant onto `record`, building its magnet when the hash
/// is usable. `display_name` labels the magnet.
pub(crate) fn apply_variant(
    mut record: ContentRecord,
    variant: Option<&Variant>,
    display_name: &str,
    magnets: &MagnetLinkBuilder,
) -> ContentRecord {
    let Some(variant) = variant else {
        return record;
    };
    record.quality_label.clone_from(&variant.quality);
    record.size_label.clone_from(&variant.size);
    record.seeder_count = variant.seeds;
    if let Some(hash) = &variant.hash {
        match magnets.build(hash, display_name) {
            Ok(magnet) => {
                record.magnet_uri = Some(magnet);
                record.info_hash = Some(hash.clone());
            }
            Err(err) => debug!(record_id = %record.id, error = %err, "variant hash unusable"),
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variant(quality: &str) -> Variant {
        Variant {
            quality: Some(quality.to_string()),
            ..Variant::default()
        }
    }

    #[test]
    fn accessors_tolerate_wrong_types() {
        let doc = json!({"n": "42", "f": 7, "s": 2010, "blank": "  ", "arr": null});
        assert_eq!(unsigned(doc.get("n")), Some(42));
        assert_eq!(float(doc.get("f")), Some(7.0));
        assert_eq!(text(doc.get("s")).as_deref(), Some("2010"));
        assert_eq!(text(doc.get("blank")), None);
        assert!(string_set(doc.get("arr")).is_empty());
        assert_eq!(unsigned(doc.get("missing")), None);
    }

    #[test]
    fn preference_order_beats_variant_order() {
        let prefs = QualityPreference::new(["1080p", "720p"]);
        let variants = [variant("720p"), variant("2160p"), variant("1080P")];
        assert_eq!(
            prefs.pick(&variants).and_then(|v| v.quality.as_deref()),
            Some("1080P")
        );
    }

    #[test]
    fn falls_back_to_first_variant() {
        let prefs = QualityPreference::new(["1080p"]);
        let variants = [variant("480p"), variant("3D")];
        assert_eq!(
            prefs.pick(&variants).and_then(|v| v.quality.as_deref()),
            Some("480p")
        );
        assert!(prefs.pick(&[]).is_none());
    }

    #[test]
    fn malformed_hash_keeps_record_without_magnet() {
        let record = ContentRecord {
            id: "x_1".into(),
            ..ContentRecord::default()
        };
        let variant = Variant {
            hash: Some("not-a-hash".into()),
            seeds: Some(3),
            ..Variant::default()
        };
        let out = apply_variant(record, Some(&variant), "X", &MagnetLinkBuilder::new());
        assert!(out.info_hash.is_none());
        assert!(out.magnet_uri.is_none());
        assert_eq!(out.seeder_count, Some(3));
    }

    #[test]
    fn valid_hash_sets_hash_and_magnet_together() {
        let hash = "ABCDEF0123456789ABCDEF0123456789ABCDEF01";
        let variant = Variant {
            hash: Some(hash.into()),
            ..Variant::default()
        };
        let out = apply_variant(
            ContentRecord::default(),
            Some(&variant),
            "X",
            &MagnetLinkBuilder::new(),
        );
        assert_eq!(out.info_hash.as_deref(), Some(hash));
        assert!(out.magnet_uri.is_some());
    }
}
