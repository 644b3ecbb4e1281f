#![forbid(unsafe_code)]

//! Thin entrypoint for the `reelswarm` command.

#[tokio::main]
async fn main() {
    std::process::exit(reelswarm_cli::run().await);
}
