//! Search and trending handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use reelswarm_torrent_core::{ContentRecord, KindFilter};
use serde::Deserialize;
use tracing::info;

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    pub(crate) q: Option<String>,
    #[serde(default, rename = "type")]
    pub(crate) kind: Option<String>,
}

fn parse_filter(raw: Option<&str>) -> Result<KindFilter, ApiError> {
    raw.map_or(Ok(KindFilter::All), |value| {
        value
            .parse()
            .map_err(|_| ApiError::bad_request(format!("type '{value}' is not a content kind")))
    })
}

pub(crate) async fn search(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ContentRecord>>, ApiError> {
    let filter = parse_filter(query.kind.as_deref())?;
    let term = query.q.as_deref().map_or("", str::trim);
    let records = state.discovery.search(term, filter).await;
    info!(query = %term, results = records.len(), "search served");
    Ok(Json(records))
}

pub(crate) async fn trending(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ContentRecord>>, ApiError> {
    let filter = parse_filter(query.kind.as_deref())?;
    Ok(Json(state.discovery.trending(filter).await))
}
