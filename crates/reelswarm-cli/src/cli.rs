//! Argument parsing and command dispatch.

use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, parse_url};
use crate::commands::discovery::{handle_play, handle_search, handle_trending};
use crate::commands::session::{handle_status, handle_stop};
use crate::commands::tail::handle_tail;

const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Parse arguments, run the command, and return the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();
    match execute(cli, &trace_id).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli, trace_id: &str) -> CliResult<()> {
    let ctx = AppContext::new(cli.api_url, cli.timeout, trace_id)?;
    dispatch(&ctx, cli.command, cli.output).await
}

pub(crate) async fn dispatch(
    ctx: &AppContext,
    command: Command,
    output: OutputFormat,
) -> CliResult<()> {
    match command {
        Command::Search(args) => handle_search(ctx, args, output).await,
        Command::Trending(args) => handle_trending(ctx, args, output).await,
        Command::Play(args) => handle_play(ctx, args, output).await,
        Command::Stop => handle_stop(ctx).await,
        Command::Status => handle_status(ctx, output).await,
        Command::Tail(args) => handle_tail(ctx, args).await,
    }
}

#[derive(Parser)]
#[command(name = "reelswarm", about = "Search, stream, and watch a reelswarm server")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "REELSWARM_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "REELSWARM_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long = "output",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search every configured provider.
    Search(SearchArgs),
    /// List the most downloaded titles.
    Trending(TrendingArgs),
    /// Start streaming a search result or a raw magnet.
    Play(PlayArgs),
    /// Stop the active session.
    Stop,
    /// Show the session snapshot.
    Status,
    /// Follow session events.
    Tail(TailArgs),
}

#[derive(Args, Default)]
pub(crate) struct SearchArgs {
    #[arg(help = "Search terms")]
    pub(crate) query: String,
    #[arg(long = "type", help = "movie, tv, anime, documentary, or all")]
    pub(crate) kind: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct TrendingArgs {
    #[arg(long = "type", help = "movie, tv, anime, documentary, or all")]
    pub(crate) kind: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct PlayArgs {
    #[arg(
        help = "Record id from search output",
        required_unless_present = "magnet",
        conflicts_with = "magnet"
    )]
    pub(crate) id: Option<String>,
    #[arg(long, help = "Search terms used to find the record (defaults to trending)")]
    pub(crate) query: Option<String>,
    #[arg(long = "type", help = "Kind filter for the lookup search")]
    pub(crate) kind: Option<String>,
    #[arg(long, help = "Stream this magnet URI directly")]
    pub(crate) magnet: Option<String>,
    #[arg(long, requires = "magnet", help = "Title shown for a raw magnet")]
    pub(crate) title: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct TailArgs {
    #[arg(long, value_delimiter = ',', help = "Filter to event kinds")]
    pub(crate) event: Vec<String>,
    #[arg(long, help = "Resume after this event id")]
    pub(crate) since: Option<u64>,
    #[arg(
        long,
        default_value_t = 5,
        help = "Seconds to wait before reconnecting"
    )]
    pub(crate) retry_secs: u64,
    #[arg(long, help = "Exit when the server closes the stream")]
    pub(crate) no_reconnect: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
