//! Prometheus-backed metrics registry.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Metrics shared by discovery, the session manager and the HTTP surface.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    searches_total: IntCounter,
    provider_failures_total: IntCounterVec,
    sessions_started_total: IntCounter,
    session_outcomes_total: IntCounterVec,
    active_sessions: IntGauge,
    download_rate_bytes: IntGauge,
    upload_rate_bytes: IntGauge,
}

/// Point-in-time view of selected collectors.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Searches served.
    pub searches_total: u64,
    /// Sessions started.
    pub sessions_started_total: u64,
    /// Sessions currently holding an engine torrent (0 or 1).
    pub active_sessions: i64,
    /// Latest download rate sample in bytes per second.
    pub download_rate_bytes: i64,
}

impl Metrics {
    /// Construct a registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("reelswarm_http_requests_total", "HTTP requests served"),
            &["route", "code"],
        )?;
        let searches_total = IntCounter::with_opts(Opts::new(
            "reelswarm_search_total",
            "Aggregated searches executed",
        ))?;
        let provider_failures_total = IntCounterVec::new(
            Opts::new(
                "reelswarm_provider_failures_total",
                "Index provider calls dropped from search results",
            ),
            &["provider"],
        )?;
        let sessions_started_total = IntCounter::with_opts(Opts::new(
            "reelswarm_sessions_started_total",
            "Streaming sessions started",
        ))?;
        let session_outcomes_total = IntCounterVec::new(
            Opts::new(
                "reelswarm_session_outcomes_total",
                "Streaming sessions ended, by terminal state",
            ),
            &["outcome"],
        )?;
        let active_sessions = IntGauge::with_opts(Opts::new(
            "reelswarm_active_sessions",
            "Sessions currently holding an engine torrent",
        ))?;
        let download_rate_bytes = IntGauge::with_opts(Opts::new(
            "reelswarm_download_rate_bytes",
            "Latest download rate of the active session",
        ))?;
        let upload_rate_bytes = IntGauge::with_opts(Opts::new(
            "reelswarm_upload_rate_bytes",
            "Latest upload rate of the active session",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(searches_total.clone()))?;
        registry.register(Box::new(provider_failures_total.clone()))?;
        registry.register(Box::new(sessions_started_total.clone()))?;
        registry.register(Box::new(session_outcomes_total.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;
        registry.register(Box::new(download_rate_bytes.clone()))?;
        registry.register(Box::new(upload_rate_bytes.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                searches_total,
                provider_failures_total,
                sessions_started_total,
                session_outcomes_total,
                active_sessions,
                download_rate_bytes,
                upload_rate_bytes,
            }),
        })
    }

    /// Count an HTTP request for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a search.
    pub fn inc_search(&self) {
        self.inner.searches_total.inc();
    }

    /// Count a provider dropped from a search.
    pub fn inc_provider_failure(&self, provider: &str) {
        self.inner
            .provider_failures_total
            .with_label_values(&[provider])
            .inc();
    }

    /// Count a started session and mark it active.
    pub fn session_started(&self) {
        self.inner.sessions_started_total.inc();
        self.inner.active_sessions.set(1);
    }

    /// Count a session ending in `outcome` and clear the active gauges.
    pub fn session_ended(&self, outcome: &str) {
        self.inner
            .session_outcomes_total
            .with_label_values(&[outcome])
            .inc();
        self.inner.active_sessions.set(0);
        self.inner.download_rate_bytes.set(0);
        self.inner.upload_rate_bytes.set(0);
    }

    /// Record the latest throughput sample.
    pub fn observe_rates(&self, download: u64, upload: u64) {
        self.inner
            .download_rate_bytes
            .set(i64::try_from(download).unwrap_or(i64::MAX));
        self.inner
            .upload_rate_bytes
            .set(i64::try_from(upload).unwrap_or(i64::MAX));
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Snapshot of the most relevant collectors.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            searches_total: self.inner.searches_total.get(),
            sessions_started_total: self.inner.sessions_started_total.get(),
            active_sessions: self.inner.active_sessions.get(),
            download_rate_bytes: self.inner.download_rate_bytes.get(),
        }
    }
}
