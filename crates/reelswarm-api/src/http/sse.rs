//! Server-sent event streaming of session events.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{self, Sse},
};
use futures_util::{StreamExt, future};
use reelswarm_events::{EventBus, EventEnvelope, EventId};
use serde::Deserialize;
use tracing::{debug, error};

use crate::http::constants::{EVENT_KIND_WHITELIST, HEADER_LAST_EVENT_ID, SSE_KEEP_ALIVE_SECS};
use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SseQuery {
    #[serde(default)]
    pub(crate) event: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SseFilter {
    pub(crate) event_kinds: HashSet<String>,
}

impl SseFilter {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        self.event_kinds.is_empty() || self.event_kinds.contains(envelope.event.kind())
    }
}

pub(crate) async fn stream_events(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl futures_core::Stream<Item = Result<sse::Event, Infallible>> + Send>, ApiError>
{
    let filter = build_sse_filter(&query)?;
    let last_id = headers
        .get(HEADER_LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<EventId>().ok());
    debug!(?last_id, kinds = filter.event_kinds.len(), "event stream opened");

    Ok(
        Sse::new(event_sse_stream(state.events.clone(), last_id, filter)).keep_alive(
            sse::KeepAlive::new()
                .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
                .text("keep-alive"),
        ),
    )
}

pub(crate) fn build_sse_filter(query: &SseQuery) -> Result<SseFilter, ApiError> {
    let mut filter = SseFilter::default();
    if let Some(events) = query.event.as_deref() {
        for value in events
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            if !EVENT_KIND_WHITELIST.contains(&value) {
                return Err(ApiError::bad_request(format!(
                    "event filter '{value}' is not recognised"
                )));
            }
            filter.event_kinds.insert(value.to_string());
        }
    }
    Ok(filter)
}

pub(crate) fn event_replay_stream(
    bus: EventBus,
    since: Option<EventId>,
) -> impl futures_core::Stream<Item = EventEnvelope> + Send {
    stream! {
        let mut events = bus.subscribe(since);
        while let Some(envelope) = events.next().await {
            yield envelope;
        }
    }
}

pub(crate) fn event_sse_stream(
    bus: EventBus,
    since: Option<EventId>,
    filter: SseFilter,
) -> impl futures_core::Stream<Item = Result<sse::Event, Infallible>> + Send {
    event_replay_stream(bus, since)
        .filter(move |envelope| future::ready(filter.matches(envelope)))
        .filter_map(|envelope| async move {
            match serde_json::to_string(&envelope) {
                Ok(payload) => Some(Ok(sse::Event::default()
                    .id(envelope.id.to_string())
                    .event(envelope.event.kind())
                    .data(payload))),
                Err(err) => {
                    error!(error = %err, "failed to serialise SSE event payload");
                    None
                }
            }
        })
}
