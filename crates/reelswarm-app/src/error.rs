//! Bootstrap failures.
//!
//! Messages stay constant; the operation field names the step that failed.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Loading or validating configuration failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: reelswarm_config::ConfigError,
    },
    /// Logging or metrics setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: anyhow::Error,
    },
    /// Building the provider HTTP client failed.
    #[error("discovery operation failed")]
    Discovery {
        /// Operation identifier.
        operation: &'static str,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// The session worker rejected a bootstrap request.
    #[error("session operation failed")]
    Session {
        /// Operation identifier.
        operation: &'static str,
        /// Source session error.
        source: reelswarm_session::SessionError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: reelswarm_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: reelswarm_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn discovery(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Discovery { operation, source }
    }

    pub(crate) const fn session(
        operation: &'static str,
        source: reelswarm_session::SessionError,
    ) -> Self {
        Self::Session { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: reelswarm_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn helpers_build_variants_with_sources() {
        let config = AppError::config(
            "config.load",
            reelswarm_config::ConfigError::Parse {
                path: "reelswarm.yaml".into(),
                reason: "bad indent".to_string(),
            },
        );
        assert!(matches!(
            config,
            AppError::Config {
                operation: "config.load",
                ..
            }
        ));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let api = AppError::api_server(
            "api.serve",
            reelswarm_api::ApiServerError::Serve {
                source: io::Error::other("io"),
            },
        );
        assert!(matches!(api, AppError::ApiServer { .. }));

        let telemetry = AppError::telemetry("telemetry.init", anyhow::anyhow!("installed twice"));
        assert_eq!(telemetry.to_string(), "telemetry operation failed");

        let session = AppError::session(
            "session.bind_playback",
            reelswarm_session::SessionError::WorkerGone,
        );
        assert!(matches!(session, AppError::Session { .. }));
    }
}
