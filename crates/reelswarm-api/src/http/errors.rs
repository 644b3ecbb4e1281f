//! RFC 9457 problem responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use reelswarm_session::SessionError;
use reelswarm_torrent_core::TorrentError;
use serde::Serialize;
use tracing::warn;

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_CONTENT_TYPE, PROBLEM_ENGINE_UNAVAILABLE, PROBLEM_INTERNAL,
    PROBLEM_NOT_FOUND, PROBLEM_NOT_READY, PROBLEM_RANGE, PROBLEM_SERVICE_UNAVAILABLE,
};

#[derive(Debug, Serialize)]
pub(crate) struct ProblemDetails {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) title: String,
    pub(crate) status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
}

/// Handler failure rendered as `application/problem+json`.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    pub(crate) detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn engine_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            PROBLEM_ENGINE_UNAVAILABLE,
            "swarm engine unavailable",
        )
        .with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, PROBLEM_NOT_FOUND, "not found").with_detail(detail)
    }

    pub(crate) fn not_ready(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_NOT_READY, "not ready").with_detail(detail)
    }

    pub(crate) fn range_not_satisfiable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::RANGE_NOT_SATISFIABLE,
            PROBLEM_RANGE,
            "range not satisfiable",
        )
        .with_detail(detail)
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Torrent(TorrentError::Validation { field, reason }) => {
                Self::bad_request(format!("{field}: {reason}"))
            }
            SessionError::Torrent(err @ TorrentError::Engine { .. }) => {
                warn!(error = %err, "swarm engine unavailable");
                Self::engine_unavailable(err.to_string())
            }
            SessionError::Torrent(err @ TorrentError::NoSession) => {
                Self::not_found(err.to_string())
            }
            SessionError::Torrent(err @ TorrentError::FileNotSelected) => {
                Self::not_ready(err.to_string())
            }
            SessionError::WorkerGone => {
                Self::service_unavailable("session worker is not running")
            }
            SessionError::Torrent(err) => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        let mut response = (self.status, Json(body)).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_CONTENT_TYPE));
        response
    }
}
