use std::path::PathBuf;
use std::sync::Arc;

use reelswarm_api::ApiServer;
use reelswarm_config::{ConfigLoader, ReelswarmConfig};
use reelswarm_discovery::ContentDiscoveryAggregator;
use reelswarm_events::EventBus;
use reelswarm_session::{EngineContext, TorrentSessionManager, TracingSink};
use reelswarm_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use tracing::{info, warn};

use crate::engine::engine_context;
use crate::error::{AppError, AppResult};

/// Environment variable naming the configuration file to load.
pub const ENV_CONFIG_PATH: &str = "REELSWARM_CONFIG";

const EVENT_BUFFER: usize = 512;

/// Dependencies resolved before the boot sequence starts.
pub(crate) struct BootstrapDependencies {
    config: ReelswarmConfig,
    telemetry: Metrics,
    engine: EngineContext,
}

impl BootstrapDependencies {
    /// Resolve configuration from `REELSWARM_CONFIG` and the environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config_path = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
        let config = load_config(config_path)?;
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let engine = engine_context(&config);
        Ok(Self {
            config,
            telemetry,
            engine,
        })
    }
}

pub(crate) fn load_config(path: Option<PathBuf>) -> AppResult<ReelswarmConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::new().with_file(path),
        None => ConfigLoader::new(),
    };
    loader
        .load()
        .map_err(|err| AppError::config("config.load", err))
}

/// Services wired over one configuration.
pub(crate) struct Services {
    pub(crate) server: ApiServer,
    pub(crate) sessions: TorrentSessionManager,
}

/// Wire discovery, the session worker, and the router. Must run inside a
/// Tokio runtime because the session worker is spawned here.
pub(crate) async fn build_services(
    config: &ReelswarmConfig,
    telemetry: Metrics,
    engine: EngineContext,
) -> AppResult<Services> {
    let discovery = ContentDiscoveryAggregator::from_config(&config.discovery)
        .map_err(|err| AppError::discovery("discovery.client", err))?
        .with_metrics(telemetry.clone());
    info!(providers = ?discovery.provider_names(), "discovery providers configured");

    let sessions = TorrentSessionManager::spawn_with_metrics(
        Arc::new(engine),
        EventBus::with_capacity(EVENT_BUFFER),
        &config.session,
        telemetry.clone(),
    );
    sessions
        .bind_playback(Arc::new(TracingSink))
        .await
        .map_err(|err| AppError::session("session.bind_playback", err))?;

    let server = ApiServer::new(discovery, sessions.clone(), telemetry);
    Ok(Services { server, sessions })
}

/// Entry point for the server boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, service wiring, or the HTTP
/// listener fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        config,
        telemetry,
        engine,
    } = dependencies;

    init_logging(&LoggingConfig {
        level: &config.logging.level,
        format: LogFormat::from_setting(config.logging.format.as_deref()),
        build_sha: build_sha(),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    info!(bind_addr = %config.http.bind_addr, "reelswarm bootstrap starting");

    let Services { server, sessions } = build_services(&config, telemetry, engine).await?;
    let served = server.serve(config.http.bind_addr).await;

    // Release the engine torrent before the runtime goes away.
    if let Err(err) = sessions.stop_session().await {
        warn!(error = %err, "failed to stop the session during shutdown");
    }
    served.map_err(|err| AppError::api_server("api.serve", err))?;
    info!("reelswarm stopped");
    Ok(())
}
