#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! Reelswarm server bootstrap.
//!
//! Layout: `bootstrap.rs` (config, logging, service wiring), `engine.rs`
//! (swarm client factory selection), `error.rs` (bootstrap failures).

/// Service wiring and the boot sequence.
pub mod bootstrap;
/// Swarm client factory selection.
pub mod engine;
/// Application error types.
pub mod error;

pub use bootstrap::{ENV_CONFIG_PATH, run_app};
pub use error::{AppError, AppResult};
