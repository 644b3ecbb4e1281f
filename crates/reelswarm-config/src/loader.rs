//! File and environment loading.
//!
//! Precedence, lowest first: built-in defaults, the optional YAML/JSON file,
//! then `REELSWARM_*` environment variables. The merged document is validated
//! before it is returned.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ReelswarmConfig;
use crate::validate::validate;

/// Listen address override.
pub const ENV_BIND_ADDR: &str = "REELSWARM_BIND_ADDR";
/// Public origin override for playback stream URLs.
pub const ENV_PUBLIC_URL: &str = "REELSWARM_PUBLIC_URL";
/// Log level override.
pub const ENV_LOG_LEVEL: &str = "REELSWARM_LOG_LEVEL";
/// Log format override.
pub const ENV_LOG_FORMAT: &str = "REELSWARM_LOG_FORMAT";
/// Ready timeout override, in seconds.
pub const ENV_READY_TIMEOUT_SECS: &str = "REELSWARM_READY_TIMEOUT_SECS";
/// Download directory override.
pub const ENV_DOWNLOAD_DIR: &str = "REELSWARM_DOWNLOAD_DIR";
/// Provider request timeout override, in milliseconds.
pub const ENV_REQUEST_TIMEOUT_MS: &str = "REELSWARM_REQUEST_TIMEOUT_MS";

/// Builder that assembles a [`ReelswarmConfig`].
#[derive(Debug, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    use_env: bool,
}

impl ConfigLoader {
    /// Loader reading defaults plus the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: None,
            use_env: true,
        }
    }

    /// Read the given file on top of the defaults. The file must exist.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Skip environment overrides.
    #[must_use]
    pub const fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load, override and validate.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed, an environment
    /// override is malformed, or validation fails.
    pub fn load(&self) -> ConfigResult<ReelswarmConfig> {
        let mut config = match &self.path {
            Some(path) => read_file(path)?,
            None => ReelswarmConfig::default(),
        };
        if self.use_env {
            apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        }
        validate(&config)?;
        Ok(config)
    }
}

fn read_file(path: &Path) -> ConfigResult<ReelswarmConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read_config",
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration file");
    parse_document(path, &raw)
}

/// Parse a document, choosing YAML or JSON by file extension.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when the document does not match the schema.
pub fn parse_document(path: &Path, raw: &str) -> ConfigResult<ReelswarmConfig> {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    let parsed = if is_yaml {
        serde_yaml::from_str(raw).map_err(|err| err.to_string())
    } else {
        serde_json::from_str(raw).map_err(|err| err.to_string())
    };
    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Apply `REELSWARM_*` overrides using `lookup` to read variables.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when a numeric or address override
/// cannot be parsed.
pub fn apply_env_overrides<F>(config: &mut ReelswarmConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_BIND_ADDR) {
        config.http.bind_addr = value.trim().parse().map_err(|_| {
            ConfigError::invalid("http", "bind_addr", Some(value.clone()), "must be host:port")
        })?;
    }
    if let Some(value) = lookup(ENV_PUBLIC_URL) {
        config.http.public_url = Some(value.trim().to_string());
    }
    if let Some(value) = lookup(ENV_LOG_LEVEL) {
        config.logging.level = value;
    }
    if let Some(value) = lookup(ENV_LOG_FORMAT) {
        config.logging.format = Some(value.trim().to_ascii_lowercase());
    }
    if let Some(value) = lookup(ENV_READY_TIMEOUT_SECS) {
        config.session.ready_timeout_secs = parse_u64("session", "ready_timeout_secs", &value)?;
    }
    if let Some(value) = lookup(ENV_DOWNLOAD_DIR) {
        config.session.download_dir = PathBuf::from(value);
    }
    if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_MS) {
        config.discovery.request_timeout_ms =
            parse_u64("discovery", "request_timeout_ms", &value)?;
    }
    Ok(())
}

fn parse_u64(section: &str, field: &str, value: &str) -> ConfigResult<u64> {
    value.trim().parse().map_err(|_| {
        ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must be a non-negative integer",
        )
    })
}
