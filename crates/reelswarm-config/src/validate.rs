//! Validation helpers for configuration documents.

use reelswarm_torrent_core::ContentKind;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{ProviderSource, ReelswarmConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Check a loaded document for values the runtime cannot honour.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidField`] encountered.
pub fn validate(config: &ReelswarmConfig) -> ConfigResult<()> {
    validate_discovery(config)?;
    validate_session(config)?;
    validate_http(config)?;
    validate_logging(config)
}

fn validate_http(config: &ReelswarmConfig) -> ConfigResult<()> {
    match &config.http.public_url {
        Some(url) => ensure_http_url("http", "public_url", url.trim()),
        None => Ok(()),
    }
}

fn validate_discovery(config: &ReelswarmConfig) -> ConfigResult<()> {
    let discovery = &config.discovery;
    ensure_positive("discovery", "request_timeout_ms", discovery.request_timeout_ms)?;
    ensure_positive(
        "discovery",
        "max_results_per_provider",
        u64::from(discovery.max_results_per_provider),
    )?;

    if discovery
        .quality_preference
        .iter()
        .any(|tier| tier.trim().is_empty())
    {
        return Err(ConfigError::invalid(
            "discovery",
            "quality_preference",
            None,
            "entries must not be empty",
        ));
    }

    for (index, provider) in discovery.providers.iter().enumerate() {
        let field = format!("providers[{index}]");
        if provider.name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "discovery",
                &format!("{field}.name"),
                None,
                "must not be empty",
            ));
        }
        let produced = match &provider.source {
            ProviderSource::Yts { .. } => ContentKind::Movie,
            ProviderSource::Json(json) => json.kind,
        };
        if let Some(kind) = provider.kinds.iter().find(|kind| **kind != produced) {
            return Err(ConfigError::invalid(
                "discovery",
                &format!("{field}.kinds"),
                Some(kind.to_string()),
                "provider only produces records of its source kind",
            ));
        }
        match &provider.source {
            ProviderSource::Yts { base_url } => {
                ensure_http_url("discovery", &format!("{field}.base_url"), base_url)?;
            }
            ProviderSource::Json(json) => {
                ensure_http_url("discovery", &format!("{field}.url_template"), &json.url_template)?;
                if !json.url_template.contains("{query}") {
                    return Err(ConfigError::invalid(
                        "discovery",
                        &format!("{field}.url_template"),
                        Some(json.url_template.clone()),
                        "must contain a {query} placeholder",
                    ));
                }
                if !json.results_pointer.is_empty() && !json.results_pointer.starts_with('/') {
                    return Err(ConfigError::invalid(
                        "discovery",
                        &format!("{field}.results_pointer"),
                        Some(json.results_pointer.clone()),
                        "must be empty or a JSON pointer starting with '/'",
                    ));
                }
            }
        }
    }
    Ok(())
}

fn validate_session(config: &ReelswarmConfig) -> ConfigResult<()> {
    let session = &config.session;
    ensure_positive("session", "poll_interval_ms", session.poll_interval_ms)?;
    ensure_positive("session", "telemetry_interval_ms", session.telemetry_interval_ms)?;
    if session.download_dir.as_os_str().is_empty() {
        return Err(ConfigError::invalid(
            "session",
            "download_dir",
            None,
            "must not be empty",
        ));
    }
    Ok(())
}

fn validate_logging(config: &ReelswarmConfig) -> ConfigResult<()> {
    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::invalid(
            "logging",
            "level",
            Some(config.logging.level.clone()),
            "must be one of trace, debug, info, warn, error, off",
        ));
    }
    if let Some(format) = &config.logging.format
        && !matches!(format.as_str(), "json" | "pretty")
    {
        return Err(ConfigError::invalid(
            "logging",
            "format",
            Some(format.clone()),
            "must be json or pretty",
        ));
    }
    Ok(())
}

fn ensure_positive(section: &str, field: &str, value: u64) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must be greater than zero",
        ));
    }
    Ok(())
}

fn ensure_http_url(section: &str, field: &str, value: &str) -> ConfigResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must be an http(s) URL",
        ))
    }
}
