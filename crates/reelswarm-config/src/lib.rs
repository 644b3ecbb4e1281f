#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! File and environment backed configuration for reelswarm.
//!
//! Layout: `model.rs` (typed documents), `defaults.rs` (built-in values),
//! `validate.rs` (field checks), `loader.rs` (YAML/JSON + `REELSWARM_*` env).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, apply_env_overrides, parse_document};
pub use model::{
    DiscoveryConfig, HttpConfig, JsonFieldMap, JsonProviderConfig, LoggingSettings,
    ProviderConfig, ProviderSource, ReelswarmConfig, SessionConfig,
};
pub use validate::validate;
