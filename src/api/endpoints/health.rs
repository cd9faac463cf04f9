//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::config::PredictionMode;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: PredictionMode,
    pub engine: &'static str,
    pub version: &'static str,
}

/// `GET /health`: liveness plus the active prediction flow.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mode: ctx.core.mode(),
        engine: ctx.core.engine().name(),
        version: crate::config::APP_VERSION,
    })
}
