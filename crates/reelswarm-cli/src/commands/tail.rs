use std::time::Duration;

use anyhow::anyhow;
use futures_util::StreamExt;
use reelswarm_events::EventEnvelope;

use crate::cli::TailArgs;
use crate::client::{AppContext, CliError, CliResult, HEADER_LAST_EVENT_ID, classify_problem};

pub(crate) async fn handle_tail(ctx: &AppContext, args: TailArgs) -> CliResult<()> {
    let mut resume_id = args.since;

    loop {
        let mut url = ctx.endpoint("/api/session/events")?;
        if !args.event.is_empty() {
            url.query_pairs_mut()
                .append_pair("event", &args.event.join(","));
        }

        let builder = ctx.client.get(url);
        let builder = match resume_id {
            Some(id) => builder.header(HEADER_LAST_EVENT_ID, id.to_string()),
            None => builder,
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) if !args.no_reconnect => {
                eprintln!(
                    "stream connection failed: {err}. retrying in {}s",
                    args.retry_secs
                );
                tokio::time::sleep(Duration::from_secs(args.retry_secs)).await;
                continue;
            }
            Err(err) => {
                return Err(CliError::failure(anyhow!("stream connection failed: {err}")));
            }
        };

        if !response.status().is_success() {
            return Err(classify_problem(response).await);
        }

        let outcome = stream_events(response, resume_id, |envelope| {
            match serde_json::to_string_pretty(envelope) {
                Ok(text) => println!("{text}"),
                Err(err) => eprintln!("failed to format event JSON: {err}"),
            }
        })
        .await;
        match outcome {
            Ok(last_id) => resume_id = last_id,
            Err(err) if !args.no_reconnect => {
                eprintln!(
                    "stream error: {}. retrying in {}s",
                    err.display_message(),
                    args.retry_secs
                );
            }
            Err(err) => return Err(err),
        }
        if args.no_reconnect {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(args.retry_secs)).await;
    }
}

/// Parse an SSE body, handing each envelope to `emit`. Returns the last id
/// seen so a reconnect can resume after it.
pub(crate) async fn stream_events<F>(
    response: reqwest::Response,
    resume_id: Option<u64>,
    mut emit: F,
) -> CliResult<Option<u64>>
where
    F: FnMut(&EventEnvelope),
{
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    let mut current_id: Option<u64> = None;
    let mut current_data = Vec::new();
    let mut last_seen = resume_id;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|err| CliError::failure(anyhow!("failed to read event stream: {err}")))?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim_end_matches('\r').to_string();
            buffer.drain(..=pos);
            if line.is_empty() {
                if current_data.is_empty() {
                    current_id = None;
                    continue;
                }
                let payload = current_data.join("\n");
                current_data.clear();
                if let Some(id) = current_id.take() {
                    // Replays can overlap what was already printed.
                    if last_seen.is_some_and(|seen| id <= seen) {
                        continue;
                    }
                    last_seen = Some(id);
                }
                match serde_json::from_str::<EventEnvelope>(&payload) {
                    Ok(envelope) => emit(&envelope),
                    Err(err) => eprintln!("discarding malformed event payload: {err}"),
                }
            } else if let Some(data) = line.strip_prefix("data:") {
                current_data.push(data.trim_start().to_string());
            } else if let Some(id) = line.strip_prefix("id:")
                && let Ok(value) = id.trim().parse::<u64>()
            {
                current_id = Some(value);
            }
        }
    }

    Ok(last_seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reelswarm_events::{Event, SessionState};
    use uuid::Uuid;

    fn frame(id: u64, session_id: Uuid, state: SessionState) -> String {
        let envelope = EventEnvelope {
            id,
            timestamp: chrono::Utc::now(),
            event: Event::StateChanged {
                session_id,
                state,
                message: None,
            },
        };
        let data = serde_json::to_string(&envelope).expect("envelope serialises");
        format!("id: {id}\nevent: {}\ndata: {data}\n\n", envelope.event.kind())
    }

    #[tokio::test]
    async fn frames_parse_and_replays_are_skipped() -> anyhow::Result<()> {
        let session_id = Uuid::new_v4();
        let body = [
            ": keep-alive\n\n".to_string(),
            frame(4, session_id, SessionState::Resolving),
            frame(5, session_id, SessionState::Ready),
            "data: not json\n\n".to_string(),
            frame(6, session_id, SessionState::Streaming),
        ]
        .concat();
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/session/events");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        });

        let response = reqwest::get(server.url("/api/session/events")).await?;
        let mut seen = Vec::new();
        let last = stream_events(response, Some(4), |envelope| seen.push(envelope.id))
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert_eq!(seen, [5, 6]);
        assert_eq!(last, Some(6));
        Ok(())
    }

    #[tokio::test]
    async fn tail_sends_filters_and_resume_id() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/session/events")
                .query_param("event", "progress,state_changed")
                .header("last-event-id", "9");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(frame(10, Uuid::nil(), SessionState::Stopped));
        });
        let ctx = AppContext::new(server.base_url().parse()?, 5, "trace-test")
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        handle_tail(
            &ctx,
            TailArgs {
                event: vec!["progress".to_string(), "state_changed".to_string()],
                since: Some(9),
                retry_secs: 0,
                no_reconnect: true,
            },
        )
        .await
        .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn rejected_filters_surface_as_validation_errors() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/session/events");
            then.status(400).body(
                r#"{"type":"x","title":"bad request","status":400,"detail":"event filter 'nope' is not recognised"}"#,
            );
        });
        let ctx = AppContext::new(server.base_url().parse()?, 5, "trace-test")
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        let err = handle_tail(
            &ctx,
            TailArgs {
                event: vec!["nope".to_string()],
                no_reconnect: true,
                ..TailArgs::default()
            },
        )
        .await
        .err();
        assert_eq!(err.map(|err| err.exit_code()), Some(2));
        Ok(())
    }
}
