//! Default values for configuration fields.

/// Base URL of the YTS movie index.
pub(crate) const YTS_BASE_URL: &str = "https://yts.mx";
/// Per-provider HTTP timeout.
pub(crate) const REQUEST_TIMEOUT_MS: u64 = 8_000;
/// Upper bound on records requested from each provider.
pub(crate) const MAX_RESULTS_PER_PROVIDER: u32 = 50;
/// User agent sent to index providers.
pub(crate) const USER_AGENT: &str = concat!("reelswarm/", env!("CARGO_PKG_VERSION"));
/// Quality tiers preferred when a title has several variants, best first.
pub(crate) const QUALITY_PREFERENCE: &[&str] = &["1080p", "720p"];
/// Seconds to wait for the swarm to become ready.
pub(crate) const READY_TIMEOUT_SECS: u64 = 90;
/// Engine event polling cadence.
pub(crate) const POLL_INTERVAL_MS: u64 = 200;
/// Minimum spacing between published telemetry snapshots.
pub(crate) const TELEMETRY_INTERVAL_MS: u64 = 250;
/// Directory name created under the system temp dir for downloads.
pub(crate) const DOWNLOAD_DIR_NAME: &str = "reelswarm";
/// HTTP listen port on the loopback interface.
pub(crate) const BIND_PORT: u16 = 3000;
/// Default tracing level.
pub(crate) const LOG_LEVEL: &str = "info";
