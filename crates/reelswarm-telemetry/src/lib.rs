#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! Logging and metrics shared across the reelswarm workspace.
//!
//! Layout: `init.rs` (tracing subscriber), `metrics.rs` (Prometheus
//! registry), `layers.rs` (request id middleware).

pub mod init;
pub mod layers;
pub mod metrics;

pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use layers::{propagate_request_id_layer, set_request_id_layer};
pub use metrics::{Metrics, MetricsSnapshot};
