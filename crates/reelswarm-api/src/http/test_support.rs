use std::sync::Arc;
use std::time::Duration;

use reelswarm_config::SessionConfig;
use reelswarm_discovery::ContentDiscoveryAggregator;
use reelswarm_events::EventBus;
use reelswarm_session::{EngineContext, StubSwarmClient, TorrentSessionManager};
use reelswarm_telemetry::Metrics;
use reelswarm_torrent_core::SwarmClient;

use crate::state::ApiState;

pub(crate) fn empty_discovery() -> ContentDiscoveryAggregator {
    ContentDiscoveryAggregator::new(Vec::new(), Duration::from_secs(1))
}

pub(crate) fn state_with(
    discovery: ContentDiscoveryAggregator,
    stub: &Arc<StubSwarmClient>,
) -> anyhow::Result<Arc<ApiState>> {
    let telemetry = Metrics::new()?;
    let client: Arc<dyn SwarmClient> = Arc::clone(stub) as Arc<dyn SwarmClient>;
    let sessions = TorrentSessionManager::spawn_with_metrics(
        Arc::new(EngineContext::with_client(client)),
        EventBus::with_capacity(64),
        &SessionConfig {
            poll_interval_ms: 10,
            ..SessionConfig::default()
        },
        telemetry.clone(),
    );
    Ok(Arc::new(ApiState::new(
        discovery.with_metrics(telemetry.clone()),
        sessions,
        telemetry,
    )))
}
