//! Router construction and server host for the API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderName, Method, Request,
        header::{CONTENT_TYPE, RANGE},
    },
    routing::get,
};
use reelswarm_discovery::ContentDiscoveryAggregator;
use reelswarm_session::TorrentSessionManager;
use reelswarm_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::{HEADER_LAST_EVENT_ID, HEADER_REQUEST_ID};
use crate::http::discovery::{search, trending};
use crate::http::health::{health, metrics};
use crate::http::session::{session_snapshot, start_session, stop_session};
use crate::http::sse::stream_events;
use crate::http::stream::stream_file;
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Path serving the selected file with byte-range support.
///
/// Accepts an optional `session` query parameter naming the session the
/// caller expects to be active.
pub const STREAM_ROUTE: &str = "/api/session/stream";

/// Axum router serving discovery, session control, and event streaming.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Wire the router over shared services.
    #[must_use]
    pub fn new(
        discovery: ContentDiscoveryAggregator,
        sessions: TorrentSessionManager,
        telemetry: Metrics,
    ) -> Self {
        let state = Arc::new(ApiState::new(discovery, sessions, telemetry.clone()));
        Self {
            router: Self::build_router(state, telemetry),
        }
    }

    fn build_router(state: Arc<ApiState>, telemetry: Metrics) -> Router {
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([
                CONTENT_TYPE,
                RANGE,
                HeaderName::from_static(HEADER_LAST_EVENT_ID),
            ]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(reelswarm_telemetry::propagate_request_id_layer())
            .layer(reelswarm_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        Router::new()
            .route("/api/search", get(search))
            .route("/api/trending", get(trending))
            .route(
                "/api/session",
                get(session_snapshot).post(start_session).delete(stop_session),
            )
            .route("/api/session/events", get(stream_events))
            .route(STREAM_ROUTE, get(stream_file))
            .route("/api/health", get(health))
            .route("/metrics", get(metrics))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state)
    }

    /// Serve on `addr` until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] when the listener cannot be opened and
    /// [`ApiServerError::Serve`] when the server stops with an I/O failure.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        self.serve_listener(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Serve`] when the server stops with an I/O failure.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(local) = listener.local_addr() {
            info!(addr = %local, "api listening");
        }
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::empty_discovery;
    use reelswarm_config::SessionConfig;
    use reelswarm_events::EventBus;
    use reelswarm_session::{EngineContext, StubSwarmClient};
    use reelswarm_test_support::records::streamable_record;
    use reelswarm_torrent_core::SwarmClient;
    use serde_json::Value;
    use tokio::sync::oneshot;

    struct Running {
        base: String,
        stop: oneshot::Sender<()>,
        telemetry: Metrics,
    }

    async fn spawn_server() -> anyhow::Result<Running> {
        let telemetry = Metrics::new()?;
        let client: Arc<dyn SwarmClient> = Arc::new(StubSwarmClient::new());
        let sessions = TorrentSessionManager::spawn(
            Arc::new(EngineContext::with_client(client)),
            EventBus::with_capacity(32),
            &SessionConfig::default(),
        );
        let server = ApiServer::new(empty_discovery(), sessions, telemetry.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base = format!("http://{}", listener.local_addr()?);
        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(server.serve_listener(listener, async move {
            let _ = stopped.await;
        }));
        Ok(Running {
            base,
            stop,
            telemetry,
        })
    }

    #[tokio::test]
    async fn routes_answer_over_http() -> anyhow::Result<()> {
        let running = spawn_server().await?;
        let http = reqwest::Client::new();

        let health: Value = http
            .get(format!("{}/api/health", running.base))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(health["status"], "healthy");

        let started = http
            .post(format!("{}/api/session", running.base))
            .json(&streamable_record())
            .send()
            .await?;
        assert_eq!(started.status(), reqwest::StatusCode::ACCEPTED);
        assert!(started.headers().contains_key(HEADER_REQUEST_ID));

        let bad = http
            .get(format!("{}/api/search?type=podcast", running.base))
            .send()
            .await?;
        assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(
            bad.headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/problem+json")
        );

        let stopped = http
            .delete(format!("{}/api/session", running.base))
            .send()
            .await?;
        assert_eq!(stopped.status(), reqwest::StatusCode::NO_CONTENT);

        let text = running.telemetry.render()?;
        assert!(text.contains("route=\"/api/session\""));
        let _ = running.stop.send(());
        Ok(())
    }

    #[tokio::test]
    async fn bind_conflicts_surface_as_bind_errors() -> anyhow::Result<()> {
        let holder = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = holder.local_addr()?;
        let server = ApiServer::new(
            empty_discovery(),
            TorrentSessionManager::spawn(
                Arc::new(EngineContext::with_client(Arc::new(StubSwarmClient::new()))),
                EventBus::new(),
                &SessionConfig::default(),
            ),
            Metrics::new()?,
        );
        let err = server.serve(addr).await.err();
        assert!(matches!(err, Some(ApiServerError::Bind { .. })));
        Ok(())
    }
}
