//! Concurrent fan-out over the configured providers.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use reelswarm_config::{DiscoveryConfig, ProviderSource};
use reelswarm_telemetry::Metrics;
use reelswarm_torrent_core::{ContentRecord, KindFilter};
use tracing::{debug, info, warn};

use crate::json::JsonIndexProvider;
use crate::normalize::QualityPreference;
use crate::provider::{IndexProvider, build_http_client};
use crate::yts::YtsProvider;

/// Queries every eligible provider at once and keeps whatever succeeds.
///
/// A provider that errors, answers with a bad status, returns malformed JSON,
/// or exceeds the timeout contributes nothing; the search itself never fails.
#[derive(Clone)]
pub struct ContentDiscoveryAggregator {
    providers: Vec<Arc<dyn IndexProvider>>,
    timeout: Duration,
    max_results: usize,
    metrics: Option<Metrics>,
}

impl ContentDiscoveryAggregator {
    /// Aggregator over an explicit provider list, queried in that order.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn IndexProvider>>, timeout: Duration) -> Self {
        Self {
            providers,
            timeout,
            max_results: usize::MAX,
            metrics: None,
        }
    }

    /// Build the enabled providers described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, config.request_timeout())?;
        let preference = QualityPreference::new(config.quality_preference.iter().cloned());

        let providers = config
            .providers
            .iter()
            .filter(|provider| provider.enabled)
            .map(|provider| -> Arc<dyn IndexProvider> {
                match &provider.source {
                    ProviderSource::Yts { base_url } => Arc::new(
                        YtsProvider::new(
                            provider.name.clone(),
                            base_url.clone(),
                            client.clone(),
                            preference.clone(),
                        )
                        .with_kinds(provider.kinds.clone())
                        .with_limit(config.max_results_per_provider),
                    ),
                    ProviderSource::Json(json) => Arc::new(JsonIndexProvider::new(
                        provider.name.clone(),
                        json.clone(),
                        provider.kinds.clone(),
                        client.clone(),
                        preference.clone(),
                    )),
                }
            })
            .collect::<Vec<_>>();

        info!(providers = providers.len(), "discovery providers configured");
        let mut aggregator = Self::new(providers, config.request_timeout());
        aggregator.max_results = usize::try_from(config.max_results_per_provider).unwrap_or(usize::MAX);
        Ok(aggregator)
    }

    /// Attach metrics for search and provider-failure counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Cap on records kept from each provider.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Names of the providers in query order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Search every provider admitted by `filter`.
    ///
    /// Records keep provider order, then each provider's own order. No
    /// ranking or de-duplication happens across providers.
    pub async fn search(&self, query: &str, filter: KindFilter) -> Vec<ContentRecord> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_search();
        }

        let eligible: Vec<&Arc<dyn IndexProvider>> = self
            .providers
            .iter()
            .filter(|provider| match filter {
                KindFilter::All => true,
                KindFilter::Only(kind) => provider.supports(kind),
            })
            .collect();

        let calls = eligible.iter().map(|provider| async move {
            let outcome = tokio::time::timeout(self.timeout, provider.fetch(query)).await;
            (provider.name(), outcome)
        });

        let mut records = Vec::new();
        for (name, outcome) in join_all(calls).await {
            match outcome {
                Ok(Ok(mut batch)) => {
                    batch.retain(|record| filter.admits(record.kind));
                    batch.truncate(self.max_results);
                    debug!(provider = name, records = batch.len(), "provider answered");
                    records.extend(batch);
                }
                Ok(Err(err)) => {
                    warn!(provider = name, error = %err, "provider dropped from results");
                    self.record_failure(name);
                }
                Err(_) => {
                    warn!(
                        provider = name,
                        timeout_ms = self.timeout.as_millis(),
                        "provider timed out"
                    );
                    self.record_failure(name);
                }
            }
        }
        records
    }

    /// Most popular titles, i.e. a search with an empty term.
    pub async fn trending(&self, filter: KindFilter) -> Vec<ContentRecord> {
        self.search("", filter).await
    }

    fn record_failure(&self, provider: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_provider_failure(provider);
        }
    }
}
