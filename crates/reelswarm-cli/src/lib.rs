#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! Command-line client for a running reelswarm server.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `commands/`: handlers for discovery, session control, and event tailing
//! - `client.rs`: HTTP client, errors, and problem classification
//! - `output.rs`: table and JSON renderers

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod output;

pub use cli::run;
