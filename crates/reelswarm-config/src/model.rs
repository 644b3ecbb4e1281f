//! Typed configuration documents.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use reelswarm_torrent_core::ContentKind;
use serde::{Deserialize, Serialize};

use crate::defaults;

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ReelswarmConfig {
    /// Index provider settings.
    pub discovery: DiscoveryConfig,
    /// Streaming session settings.
    pub session: SessionConfig,
    /// HTTP surface settings.
    pub http: HttpConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Settings for the discovery aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Providers queried on every search, in result order.
    pub providers: Vec<ProviderConfig>,
    /// Per-provider request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// User agent sent with provider requests.
    pub user_agent: String,
    /// Preferred quality tiers, best first. The first variant wins when none match.
    pub quality_preference: Vec<String>,
    /// Records requested from each provider.
    pub max_results_per_provider: u32,
}

impl DiscoveryConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderConfig::yts(defaults::YTS_BASE_URL)],
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            user_agent: defaults::USER_AGENT.to_string(),
            quality_preference: defaults::QUALITY_PREFERENCE
                .iter()
                .map(ToString::to_string)
                .collect(),
            max_results_per_provider: defaults::MAX_RESULTS_PER_PROVIDER,
        }
    }
}

/// One external index provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Name used in logs and metrics.
    pub name: String,
    /// Disabled providers are never queried.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Content kinds this provider serves.
    #[serde(default)]
    pub kinds: Vec<ContentKind>,
    /// Wire shape of the provider.
    pub source: ProviderSource,
}

const fn enabled_by_default() -> bool {
    true
}

impl ProviderConfig {
    /// YTS movie index rooted at `base_url`.
    #[must_use]
    pub fn yts(base_url: impl Into<String>) -> Self {
        Self {
            name: "yts".to_string(),
            enabled: true,
            kinds: vec![ContentKind::Movie],
            source: ProviderSource::Yts {
                base_url: base_url.into(),
            },
        }
    }
}

/// Wire shape of a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderSource {
    /// The YTS `list_movies` API.
    Yts {
        /// Scheme and host, e.g. `https://yts.mx`.
        base_url: String,
    },
    /// Any JSON API described by pointers.
    Json(JsonProviderConfig),
}

/// Generic JSON provider description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonProviderConfig {
    /// Request URL; `{query}` is replaced by the URL-encoded search term.
    pub url_template: String,
    /// JSON pointer to the array of records, e.g. `/data/items`.
    #[serde(default)]
    pub results_pointer: String,
    /// Kind assigned to every record from this provider.
    #[serde(default)]
    pub kind: ContentKind,
    /// Where each record field lives.
    #[serde(default)]
    pub fields: JsonFieldMap,
}

/// JSON pointers locating record fields.
///
/// When `variants` is set, `hash`, `seeds`, `size` and `quality` are resolved
/// against each element of that array; otherwise against the record itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JsonFieldMap {
    /// Record identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Release year.
    pub year: String,
    /// Rating.
    pub rating: String,
    /// Array of genre strings.
    pub genres: String,
    /// Language code.
    pub language: String,
    /// Cover image URL.
    pub poster: String,
    /// Plot summary.
    pub summary: String,
    /// Optional array of quality variants.
    pub variants: Option<String>,
    /// Info hash.
    pub hash: String,
    /// Seeder count.
    pub seeds: String,
    /// Size label.
    pub size: String,
    /// Quality label.
    pub quality: String,
}

impl Default for JsonFieldMap {
    fn default() -> Self {
        Self {
            id: "/id".to_string(),
            title: "/title".to_string(),
            year: "/year".to_string(),
            rating: "/rating".to_string(),
            genres: "/genres".to_string(),
            language: "/language".to_string(),
            poster: "/poster".to_string(),
            summary: "/summary".to_string(),
            variants: None,
            hash: "/hash".to_string(),
            seeds: "/seeds".to_string(),
            size: "/size".to_string(),
            quality: "/quality".to_string(),
        }
    }
}

/// Settings for the session manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds to wait for the swarm to become ready; `0` waits forever.
    pub ready_timeout_secs: u64,
    /// Engine polling cadence in milliseconds.
    pub poll_interval_ms: u64,
    /// Minimum spacing between telemetry snapshots in milliseconds.
    pub telemetry_interval_ms: u64,
    /// Delete downloaded data when a session is stopped or fails.
    pub remove_data_on_stop: bool,
    /// Directory the engine downloads into.
    pub download_dir: PathBuf,
}

impl SessionConfig {
    /// Ready deadline, or `None` when disabled.
    #[must_use]
    pub const fn ready_timeout(&self) -> Option<Duration> {
        if self.ready_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.ready_timeout_secs))
        }
    }

    /// Engine polling cadence.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Telemetry coalescing window.
    #[must_use]
    pub const fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: defaults::READY_TIMEOUT_SECS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            telemetry_interval_ms: defaults::TELEMETRY_INTERVAL_MS,
            remove_data_on_stop: true,
            download_dir: std::env::temp_dir().join(defaults::DOWNLOAD_DIR_NAME),
        }
    }
}

/// Settings for the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
    /// Origin media players use to reach this server, e.g. `http://media-box:3000`.
    /// Derived from `bind_addr` when absent.
    pub public_url: Option<String>,
}

impl HttpConfig {
    /// Origin prefixed to playback stream URLs, without a trailing slash.
    ///
    /// An unspecified bind address (`0.0.0.0`, `::`) is reported as loopback.
    #[must_use]
    pub fn public_origin(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim().trim_end_matches('/').to_string();
        }
        let mut addr = self.bind_addr;
        if addr.ip().is_unspecified() {
            addr.set_ip(match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
            });
        }
        format!("http://{addr}")
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, defaults::BIND_PORT)),
            public_url: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level directive (`trace`..`error`); `RUST_LOG` takes precedence.
    pub level: String,
    /// `json` or `pretty`; inferred from the build profile when absent.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
