//! Byte-range streaming of the selected file while it downloads.
//!
//! Reads go through the engine's file stream, which waits for missing pieces,
//! so players can seek anywhere before the download completes.

use std::io::SeekFrom;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use crate::http::constants::STREAM_CHUNK_BYTES;
use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamQuery {
    session: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRange {
    From { start: u64, end: Option<u64> },
    Suffix(u64),
}

/// Single `bytes=` range; multi-range and malformed values are ignored.
fn parse_range(value: &str) -> Option<ByteRange> {
    let spec = value.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() {
        return end.parse().ok().map(ByteRange::Suffix);
    }
    let start = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some(ByteRange::From { start, end })
}

/// Inclusive byte bounds of `range` within a file of `total` bytes.
fn satisfy(range: ByteRange, total: u64) -> Option<(u64, u64)> {
    let last = total.checked_sub(1)?;
    match range {
        ByteRange::From { start, end } => {
            let end = end.map_or(last, |end| end.min(last));
            (start <= end).then_some((start, end))
        }
        ByteRange::Suffix(0) => None,
        ByteRange::Suffix(len) => Some((total.saturating_sub(len), last)),
    }
}

fn unsatisfiable(total: u64) -> Response {
    let mut response =
        ApiError::range_not_satisfiable(format!("file is {total} bytes long")).into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total}")) {
        response.headers_mut().insert(header::CONTENT_RANGE, value);
    }
    response
}

pub(crate) async fn stream_file(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session_id = query
        .session
        .as_deref()
        .map(|raw| {
            Uuid::parse_str(raw.trim())
                .map_err(|_| ApiError::bad_request(format!("session '{raw}' is not a UUID")))
        })
        .transpose()?;
    let stream = state.sessions.open_stream(session_id).await?;
    let total = stream.length;

    let requested = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_range);
    let (status, start, end) = match requested {
        None if total == 0 => (StatusCode::OK, 0, None),
        None => (StatusCode::OK, 0, Some(total - 1)),
        Some(range) => match satisfy(range, total) {
            Some((start, end)) => (StatusCode::PARTIAL_CONTENT, start, Some(end)),
            None => return Ok(unsatisfiable(total)),
        },
    };
    let length = end.map_or(0, |end| end - start + 1);
    debug!(start, length, total, partial = status == StatusCode::PARTIAL_CONTENT, "serving stream");

    let mut reader = stream.reader;
    if start > 0 {
        reader
            .seek(SeekFrom::Start(start))
            .await
            .map_err(|err| ApiError::internal(format!("stream seek failed: {err}")))?;
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&stream.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(end) = end.filter(|_| status == StatusCode::PARTIAL_CONTENT)
        && let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{total}"))
    {
        response_headers.insert(header::CONTENT_RANGE, value);
    }

    let body = Body::from_stream(ReaderStream::with_capacity(
        reader.take(length),
        STREAM_CHUNK_BYTES,
    ));
    Ok((status, response_headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::{empty_discovery, state_with};
    use reelswarm_session::StubSwarmClient;
    use reelswarm_test_support::records::{engine_files, streamable_record};
    use std::time::Duration;

    const CONTENTS: &[u8] = b"0123456789abcdef";

    async fn streaming_state() -> anyhow::Result<(Arc<ApiState>, Uuid)> {
        let stub = Arc::new(StubSwarmClient::new().with_contents(CONTENTS.to_vec()));
        let state = state_with(empty_discovery(), &stub)?;
        let snapshot = state.sessions.start_session(&streamable_record()).await?;
        let session_id = snapshot
            .session_id
            .ok_or_else(|| anyhow::anyhow!("no session id"))?;

        tokio::time::timeout(Duration::from_secs(3), async {
            while stub.magnet_of(session_id).is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            stub.emit_ready(session_id, engine_files(&[("movie.mp4", 16)]));
            while state.sessions.snapshot().await?.selected_file.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            anyhow::Ok(())
        })
        .await??;
        Ok((state, session_id))
    }

    fn range(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static(value));
        headers
    }

    async fn body_of(response: Response) -> anyhow::Result<Vec<u8>> {
        Ok(axum::body::to_bytes(response.into_body(), usize::MAX)
            .await?
            .to_vec())
    }

    #[test]
    fn parses_single_ranges() {
        assert_eq!(
            parse_range("bytes=0-99"),
            Some(ByteRange::From { start: 0, end: Some(99) })
        );
        assert_eq!(
            parse_range("bytes=100-"),
            Some(ByteRange::From { start: 100, end: None })
        );
        assert_eq!(parse_range("bytes=-500"), Some(ByteRange::Suffix(500)));
        assert_eq!(parse_range("bytes=0-1,4-5"), None);
        assert_eq!(parse_range("items=0-1"), None);
        assert_eq!(parse_range("bytes=x-1"), None);
    }

    #[test]
    fn ranges_are_clamped_to_the_file() {
        let open = ByteRange::From { start: 4, end: None };
        assert_eq!(satisfy(open, 16), Some((4, 15)));
        let long = ByteRange::From { start: 10, end: Some(400) };
        assert_eq!(satisfy(long, 16), Some((10, 15)));
        assert_eq!(satisfy(ByteRange::Suffix(4), 16), Some((12, 15)));
        assert_eq!(satisfy(ByteRange::Suffix(40), 16), Some((0, 15)));
        assert_eq!(satisfy(ByteRange::From { start: 16, end: None }, 16), None);
        assert_eq!(satisfy(ByteRange::Suffix(0), 16), None);
        assert_eq!(satisfy(open, 0), None);
    }

    #[tokio::test]
    async fn full_request_serves_the_whole_file() -> anyhow::Result<()> {
        let (state, _) = streaming_state().await?;
        let response = stream_file(State(state), Query(StreamQuery::default()), HeaderMap::new())
            .await
            .map_err(|err| anyhow::anyhow!("stream failed: {err:?}"))?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCEPT_RANGES),
            Some(&HeaderValue::from_static("bytes"))
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("video/mp4"))
        );
        assert_eq!(body_of(response).await?, CONTENTS);
        Ok(())
    }

    #[tokio::test]
    async fn range_request_serves_partial_content() -> anyhow::Result<()> {
        let (state, session_id) = streaming_state().await?;
        let query = StreamQuery {
            session: Some(session_id.to_string()),
        };
        let response = stream_file(State(state), Query(query), range("bytes=4-7"))
            .await
            .map_err(|err| anyhow::anyhow!("stream failed: {err:?}"))?;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE),
            Some(&HeaderValue::from_static("bytes 4-7/16"))
        );
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH),
            Some(&HeaderValue::from(4_u64))
        );
        assert_eq!(body_of(response).await?, b"4567");
        Ok(())
    }

    #[tokio::test]
    async fn unsatisfiable_range_reports_the_length() -> anyhow::Result<()> {
        let (state, _) = streaming_state().await?;
        let response = stream_file(State(state), Query(StreamQuery::default()), range("bytes=99-"))
            .await
            .map_err(|err| anyhow::anyhow!("stream failed: {err:?}"))?;

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE),
            Some(&HeaderValue::from_static("bytes */16"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn stale_or_invalid_session_ids_are_rejected() -> anyhow::Result<()> {
        let (state, _) = streaming_state().await?;

        let stale = StreamQuery {
            session: Some(Uuid::new_v4().to_string()),
        };
        let err = stream_file(State(Arc::clone(&state)), Query(stale), HeaderMap::new())
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("stale session streamed"))?;
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let garbled = StreamQuery {
            session: Some("not-a-uuid".to_string()),
        };
        let err = stream_file(State(state), Query(garbled), HeaderMap::new())
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("garbled session streamed"))?;
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn idle_manager_has_nothing_to_stream() -> anyhow::Result<()> {
        let stub = Arc::new(StubSwarmClient::new().with_contents(CONTENTS.to_vec()));
        let state = state_with(empty_discovery(), &stub)?;
        let err = stream_file(State(state), Query(StreamQuery::default()), HeaderMap::new())
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("idle manager streamed"))?;
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        Ok(())
    }
}
