pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod prediction;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::ServerError;
use crate::config::{ConfigError, Settings};
use crate::core_state::{CoreError, CoreState};

/// Fatal startup or serve failure.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(std::io::Error),

    #[error(transparent)]
    Server(#[from] ServerError),
}

pub fn run() -> Result<(), RunError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = Settings::from_env()?;
    tracing::debug!(?settings, "Settings loaded");

    // The remote scorer owns a blocking HTTP client, so the engine is built
    // and finally dropped outside the async runtime.
    let core = Arc::new(CoreState::from_settings(&settings)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(RunError::Runtime)?;
    let result = runtime.block_on(api::serve(Arc::clone(&core), settings.bind));
    drop(runtime);
    drop(core);

    result.map_err(RunError::from)
}
