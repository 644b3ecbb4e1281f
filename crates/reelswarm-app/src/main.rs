#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! Server entrypoint wiring discovery, the session worker, and the HTTP API.

use reelswarm_app::{AppResult, run_app};

/// Boot the server and block until shutdown.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
