//! Health and metrics endpoints.

use std::sync::Arc;

use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) torrents: usize,
    pub(crate) download_speed: u64,
    pub(crate) upload_speed: u64,
    pub(crate) timestamp: DateTime<Utc>,
}

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let stats = state.sessions.engine_stats().await;
    Json(HealthResponse {
        status: "healthy",
        torrents: stats.torrents,
        download_speed: stats.download_rate,
        upload_speed: stats.upload_rate,
        timestamp: Utc::now(),
    })
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::{empty_discovery, state_with};
    use axum::body::to_bytes;
    use reelswarm_session::StubSwarmClient;
    use reelswarm_test_support::records::streamable_record;

    #[tokio::test]
    async fn health_reports_engine_counters() -> anyhow::Result<()> {
        let stub = Arc::new(StubSwarmClient::new());
        let state = state_with(empty_discovery(), &stub)?;

        let Json(idle) = health(State(Arc::clone(&state))).await;
        assert_eq!(idle.status, "healthy");
        assert_eq!(idle.torrents, 0);

        state
            .sessions
            .start_session(&streamable_record())
            .await
            .map_err(|err| anyhow::anyhow!("start failed: {err}"))?;
        // The engine add runs off the worker; give it a moment to land.
        for _ in 0..100 {
            let Json(active) = health(State(Arc::clone(&state))).await;
            if active.torrents == 1 {
                return Ok(());
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        anyhow::bail!("health never reported the added torrent")
    }

    #[test]
    fn health_serialises_camel_case() -> anyhow::Result<()> {
        let body = serde_json::to_value(HealthResponse {
            status: "healthy",
            torrents: 2,
            download_speed: 1024,
            upload_speed: 16,
            timestamp: Utc::now(),
        })?;
        assert_eq!(body["downloadSpeed"], 1024);
        assert_eq!(body["uploadSpeed"], 16);
        assert!(body["timestamp"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn metrics_render_prometheus_text() -> anyhow::Result<()> {
        let state = state_with(empty_discovery(), &Arc::new(StubSwarmClient::new()))?;
        state.telemetry.inc_search();

        let response = metrics(State(state))
            .await
            .map_err(|err| anyhow::anyhow!("metrics failed: {err:?}"))?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let text = String::from_utf8(body.to_vec())?;
        assert!(text.contains("reelswarm_search_total 1"));
        Ok(())
    }
}
