use anyhow::anyhow;
use reelswarm_session::SessionSnapshot;

use crate::cli::OutputFormat;
use crate::client::{AppContext, CliError, CliResult, classify_problem};
use crate::output::render_snapshot;

pub(crate) async fn handle_stop(ctx: &AppContext) -> CliResult<()> {
    let url = ctx.endpoint("/api/session")?;
    let response = ctx
        .client
        .delete(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to /api/session failed: {err}")))?;
    if response.status().is_success() {
        println!("session stopped");
        Ok(())
    } else {
        Err(classify_problem(response).await)
    }
}

pub(crate) async fn handle_status(ctx: &AppContext, output: OutputFormat) -> CliResult<()> {
    let snapshot = fetch_snapshot(ctx).await?;
    render_snapshot(&snapshot, output)
}

async fn fetch_snapshot(ctx: &AppContext) -> CliResult<SessionSnapshot> {
    let url = ctx.endpoint("/api/session")?;
    let response = ctx
        .client
        .get(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to /api/session failed: {err}")))?;
    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }
    response
        .json::<SessionSnapshot>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse session snapshot: {err}")))
}
