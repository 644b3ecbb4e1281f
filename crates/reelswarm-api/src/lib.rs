#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! HTTP surface for search, session control, and live session events.
//!
//! Layout: `state.rs` (shared handler state), `error.rs` (server errors),
//! `http/` (router, handlers, SSE, problem responses, metrics middleware).

pub mod error;
mod http;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::{ApiServer, STREAM_ROUTE};
