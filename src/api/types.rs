//! Shared types for the HTTP layer.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::db::DatabaseError;
use crate::models::{Patient, PatientAttributes, PatientOverview, PredictionOutcome, PredictionRecord};
use crate::prediction::{self, PredictionEngine};

/// Shared context for all routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run `f` with a fresh connection on the blocking pool.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, ApiError> + Send + 'static,
    {
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || {
            let conn = core.open_db()?;
            f(&conn)
        })
        .await?
    }

    /// Run `f` inside an IMMEDIATE transaction on the blocking pool, with the
    /// engine at hand so a read, predict and write happen under one write
    /// lock. Commits only when `f` succeeds.
    pub async fn in_transaction<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection, &dyn PredictionEngine) -> Result<T, ApiError>
            + Send
            + 'static,
    {
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || {
            let mut conn = core.open_db()?;
            let tx = conn
                .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
                .map_err(DatabaseError::from)?;
            let value = f(&tx, core.engine().as_ref())?;
            tx.commit().map_err(DatabaseError::from)?;
            Ok(value)
        })
        .await?
    }

    /// Run the prediction engine for `attrs` on the blocking pool.
    pub async fn predict(&self, attrs: PatientAttributes) -> Result<PredictionOutcome, ApiError> {
        let engine = Arc::clone(self.core.engine());
        let outcome =
            tokio::task::spawn_blocking(move || prediction::predict_for(engine.as_ref(), &attrs))
                .await??;
        Ok(outcome)
    }
}

/// Date stamped on new history rows.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[derive(Debug, Serialize)]
pub struct PatientsResponse {
    pub patients: Vec<Patient>,
}

#[derive(Debug, Serialize)]
pub struct PatientOverviewsResponse {
    pub patients: Vec<PatientOverview>,
}

/// Patient write plus the prediction computed for it.
#[derive(Debug, Serialize)]
pub struct PatientPredictionResponse {
    pub patient: Patient,
    pub prediction: f64,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<PredictionRecord>,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub result: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: &'static str,
}
