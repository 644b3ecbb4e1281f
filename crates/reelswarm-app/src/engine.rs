//! Chooses the swarm client backing the session worker.
//!
//! Builds with the `rqbit` feature drive a real `librqbit` session whose
//! locators point at the API's stream route; other builds run the in-memory
//! demo engine so the API can be exercised end to end.

use std::sync::Arc;

use futures_util::FutureExt;
use reelswarm_config::ReelswarmConfig;
use reelswarm_session::EngineContext;
use reelswarm_torrent_core::SwarmClient;
use tracing::info;

/// Fraction of the demo download completed per engine poll.
pub const DEMO_STEP: f64 = 0.02;

/// Engine context whose client is created on the first session start.
#[must_use]
pub fn engine_context(config: &ReelswarmConfig) -> EngineContext {
    build_context(config)
}

/// Absolute URL of the stream route as players reach it.
#[must_use]
pub fn stream_url(config: &ReelswarmConfig) -> String {
    format!("{}{}", config.http.public_origin(), reelswarm_api::STREAM_ROUTE)
}

#[cfg(feature = "rqbit")]
fn build_context(config: &ReelswarmConfig) -> EngineContext {
    use reelswarm_session::RqbitSwarmClient;

    let download_dir = config.session.download_dir.clone();
    let stream_url = stream_url(config);
    EngineContext::new(Box::new(move || {
        let download_dir = download_dir.clone();
        let stream_url = stream_url.clone();
        async move {
            info!(download_dir = %download_dir.display(), %stream_url, "starting rqbit engine");
            let client = RqbitSwarmClient::new(download_dir, stream_url).await?;
            Ok(Arc::new(client) as Arc<dyn SwarmClient>)
        }
        .boxed()
    }))
}

#[cfg(not(feature = "rqbit"))]
fn build_context(config: &ReelswarmConfig) -> EngineContext {
    use reelswarm_session::StubSwarmClient;

    let download_dir = config.session.download_dir.clone();
    EngineContext::new(Box::new(move || {
        info!(
            download_dir = %download_dir.display(),
            "no swarm engine compiled in; using the demo engine"
        );
        async { Ok(Arc::new(StubSwarmClient::demo(DEMO_STEP)) as Arc<dyn SwarmClient>) }.boxed()
    }))
}


#[cfg(all(test, not(feature = "rqbit")))]
mod demo_tests {
    use super::*;
    use reelswarm_torrent_core::AddTorrent;
    use uuid::Uuid;

    #[tokio::test]
    async fn demo_engine_is_built_lazily() -> anyhow::Result<()> {
        let context = engine_context(&ReelswarmConfig::default());
        assert!(context.initialized().is_none());

        let client = context.client().await?;
        client
            .add_torrent(AddTorrent {
                id: Uuid::new_v4(),
                magnet_uri: "magnet:?xt=urn:btih:demo".to_string(),
                name_hint: None,
                download_dir: None,
            })
            .await?;
        assert_eq!(client.stats().await?.torrents, 1);
        assert!(context.initialized().is_some());
        Ok(())
    }
}
