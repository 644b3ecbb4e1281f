//! State shared by every handler.

use reelswarm_discovery::ContentDiscoveryAggregator;
use reelswarm_events::EventBus;
use reelswarm_session::TorrentSessionManager;
use reelswarm_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) discovery: ContentDiscoveryAggregator,
    pub(crate) sessions: TorrentSessionManager,
    pub(crate) events: EventBus,
    pub(crate) telemetry: Metrics,
}

impl ApiState {
    pub(crate) fn new(
        discovery: ContentDiscoveryAggregator,
        sessions: TorrentSessionManager,
        telemetry: Metrics,
    ) -> Self {
        let events = sessions.events().clone();
        Self {
            discovery,
            sessions,
            events,
            telemetry,
        }
    }
}
