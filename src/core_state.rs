//! Shared application state.
//!
//! `CoreState` is built once in `run()` and handed to the router. It owns
//! the database location and the prediction engine; nothing is global.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{PredictionMode, Settings};
use crate::db::{self, DatabaseError};
use crate::prediction::{self, PredictionEngine, PredictionError, RemoteScorer};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Prediction engine error: {0}")]
    Engine(#[from] PredictionError),
}

/// Dependencies shared by every request handler.
pub struct CoreState {
    db_path: PathBuf,
    mode: PredictionMode,
    engine: Arc<dyn PredictionEngine>,
}

impl CoreState {
    pub fn new(db_path: PathBuf, mode: PredictionMode, engine: Arc<dyn PredictionEngine>) -> Self {
        Self {
            db_path,
            mode,
            engine,
        }
    }

    /// Build state from settings: load the local model or configure the
    /// remote scorer, and make sure the database schema is in place.
    ///
    /// Must run outside the async runtime (the remote client is blocking).
    pub fn from_settings(settings: &Settings) -> Result<Self, CoreError> {
        let engine: Arc<dyn PredictionEngine> = match (&settings.mode, &settings.scoring) {
            (PredictionMode::Local, _) => prediction::load_local_engine(&settings.model_path)?,
            (PredictionMode::Remote, Some(scoring)) => Arc::new(RemoteScorer::new(
                &scoring.url,
                &scoring.api_key,
                scoring.timeout,
            )?),
            (PredictionMode::Remote, None) => {
                return Err(CoreError::Engine(PredictionError::Config(
                    "Remote mode requires scoring settings".into(),
                )))
            }
        };

        // Run migrations once up front so a broken schema fails at startup.
        db::open_database(&settings.db_path)?;
        tracing::info!(
            db = %settings.db_path.display(),
            mode = settings.mode.as_str(),
            engine = engine.name(),
            "Core state ready"
        );

        Ok(Self::new(settings.db_path.clone(), settings.mode, engine))
    }

    /// Open a database connection for one request.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn mode(&self) -> PredictionMode {
        self.mode
    }

    pub fn engine(&self) -> &Arc<dyn PredictionEngine> {
        &self.engine
    }
}
