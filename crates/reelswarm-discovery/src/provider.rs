//! The provider seam and its shared HTTP plumbing.

use std::time::Duration;

use async_trait::async_trait;
use reelswarm_torrent_core::{ContentKind, ContentRecord};
use serde_json::Value;

use crate::error::{DiscoveryError, DiscoveryResult};

/// A single external index queried by the aggregator.
#[async_trait]
pub trait IndexProvider: Send + Sync {
    /// Stable name used in record ids, logs, and metrics.
    fn name(&self) -> &str;

    /// Whether this provider serves titles of `kind`.
    fn supports(&self, kind: ContentKind) -> bool;

    /// Query the provider and normalize its answer.
    ///
    /// An empty `query` asks for the provider's most popular titles.
    async fn fetch(&self, query: &str) -> DiscoveryResult<Vec<ContentRecord>>;
}

/// Build the HTTP client shared by every provider.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
}

/// GET `url` and decode the body as JSON, mapping failures onto `provider`.
pub(crate) async fn get_json(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
) -> DiscoveryResult<Value> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| DiscoveryError::Request {
            provider: provider.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DiscoveryError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| DiscoveryError::Request {
            provider: provider.to_string(),
            source,
        })?;
    serde_json::from_slice(&body).map_err(|err| DiscoveryError::Decode {
        provider: provider.to_string(),
        reason: err.to_string(),
    })
}
