use anyhow::anyhow;
use reelswarm_session::SessionSnapshot;
use reelswarm_torrent_core::ContentRecord;

use crate::cli::{OutputFormat, PlayArgs, SearchArgs, TrendingArgs};
use crate::client::{AppContext, CliError, CliResult, classify_problem};
use crate::output::{render_records, render_snapshot};

pub(crate) async fn handle_search(
    ctx: &AppContext,
    args: SearchArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let records = fetch_records(ctx, "/api/search", Some(&args.query), args.kind.as_deref()).await?;
    render_records(&records, output)
}

pub(crate) async fn handle_trending(
    ctx: &AppContext,
    args: TrendingArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let records = fetch_records(ctx, "/api/trending", None, args.kind.as_deref()).await?;
    render_records(&records, output)
}

pub(crate) async fn handle_play(
    ctx: &AppContext,
    args: PlayArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let record = resolve_record(ctx, args).await?;
    let url = ctx.endpoint("/api/session")?;
    let response = ctx
        .client
        .post(url)
        .json(&record)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to /api/session failed: {err}")))?;
    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }
    let snapshot = response
        .json::<SessionSnapshot>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse session snapshot: {err}")))?;
    render_snapshot(&snapshot, output)
}

async fn resolve_record(ctx: &AppContext, args: PlayArgs) -> CliResult<ContentRecord> {
    if let Some(magnet) = args.magnet {
        let magnet = magnet.trim().to_string();
        if !magnet.starts_with("magnet:?") {
            return Err(CliError::validation("--magnet must be a magnet: URI"));
        }
        return Ok(ContentRecord {
            id: "magnet".to_string(),
            title: args.title.unwrap_or_else(|| "Magnet link".to_string()),
            magnet_uri: Some(magnet),
            ..ContentRecord::default()
        });
    }

    let id = args
        .id
        .ok_or_else(|| CliError::validation("pass a record id or --magnet"))?;
    let records = match args.query.as_deref() {
        Some(query) => {
            fetch_records(ctx, "/api/search", Some(query), args.kind.as_deref()).await?
        }
        None => fetch_records(ctx, "/api/trending", None, args.kind.as_deref()).await?,
    };
    records
        .into_iter()
        .find(|record| record.id == id)
        .ok_or_else(|| {
            CliError::validation(format!(
                "no record with id '{id}' in the results; pass --query to search for it"
            ))
        })
}

async fn fetch_records(
    ctx: &AppContext,
    path: &str,
    query: Option<&str>,
    kind: Option<&str>,
) -> CliResult<Vec<ContentRecord>> {
    let mut url = ctx.endpoint(path)?;
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(query) = query {
            pairs.append_pair("q", query);
        }
        if let Some(kind) = kind {
            pairs.append_pair("type", kind);
        }
    }
    let response = ctx
        .client
        .get(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to {path} failed: {err}")))?;
    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }
    response
        .json::<Vec<ContentRecord>>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse records: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reelswarm_test_support::records::streamable_record;
    use serde_json::json;

    fn context(server: &MockServer) -> AppContext {
        AppContext::new(
            server.base_url().parse().expect("mock URL parses"),
            5,
            "trace-test",
        )
        .expect("context builds")
    }

    #[tokio::test]
    async fn search_passes_query_and_kind() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/search")
                .query_param("q", "inception")
                .query_param("type", "movie")
                .header("x-request-id", "trace-test");
            then.status(200).json_body(json!([streamable_record()]));
        });

        let records =
            fetch_records(&context(&server), "/api/search", Some("inception"), Some("movie"))
                .await
                .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        mock.assert();
        assert_eq!(records, [streamable_record()]);
        Ok(())
    }

    #[tokio::test]
    async fn play_posts_the_matching_record() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let lookup = server.mock(|when, then| {
            when.method(GET).path("/api/trending");
            then.status(200).json_body(json!([streamable_record()]));
        });
        let expected = serde_json::to_value(streamable_record())?;
        let start = server.mock(|when, then| {
            when.method(POST).path("/api/session").json_body(expected);
            then.status(202)
                .json_body(json!({"state": "resolving", "epoch": 1, "telemetry": {
                    "progress_ratio": 0.0, "download_rate": 0, "upload_rate": 0
                }}));
        });

        handle_play(
            &context(&server),
            PlayArgs {
                id: Some("yts_3175".to_string()),
                ..PlayArgs::default()
            },
            OutputFormat::Json,
        )
        .await
        .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        lookup.assert();
        start.assert();
        Ok(())
    }

    #[tokio::test]
    async fn play_with_unknown_id_is_a_validation_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/search").query_param("q", "matrix");
            then.status(200).json_body(json!([]));
        });

        let err = handle_play(
            &context(&server),
            PlayArgs {
                id: Some("yts_9".to_string()),
                query: Some("matrix".to_string()),
                ..PlayArgs::default()
            },
            OutputFormat::Table,
        )
        .await
        .err();
        assert_eq!(err.map(|err| err.exit_code()), Some(2));
    }

    #[tokio::test]
    async fn raw_magnets_skip_the_lookup() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let record = resolve_record(
            &context(&server),
            PlayArgs {
                magnet: Some(" magnet:?xt=urn:btih:abc ".to_string()),
                title: Some("Home Video".to_string()),
                ..PlayArgs::default()
            },
        )
        .await
        .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert_eq!(record.title, "Home Video");
        assert_eq!(record.magnet_uri.as_deref(), Some("magnet:?xt=urn:btih:abc"));

        let rejected = resolve_record(
            &context(&server),
            PlayArgs {
                magnet: Some("http://example.invalid/file.torrent".to_string()),
                ..PlayArgs::default()
            },
        )
        .await
        .err();
        assert_eq!(rejected.map(|err| err.exit_code()), Some(2));
        Ok(())
    }
}
