//! HTTP router.
//!
//! The route set depends on the prediction mode: the local flow predicts on
//! every patient write, the remote flow exposes prediction as its own call.
//!
//! NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints::{health, history, patients};
use crate::api::types::ApiContext;
use crate::config::PredictionMode;
use crate::core_state::CoreState;

/// Build the service router for the mode carried by `core`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    let routes = match ctx.core.mode() {
        PredictionMode::Local => local_routes(),
        PredictionMode::Remote => remote_routes(),
    };

    routes
        .route("/health", get(health::check))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
}

fn local_routes() -> Router<ApiContext> {
    Router::new()
        .route(
            "/patients",
            get(patients::list).post(patients::create_with_prediction),
        )
        .route(
            "/patient/:id",
            get(patients::detail)
                .patch(patients::update_with_prediction)
                .delete(patients::delete),
        )
        .route(
            "/patientHistorys/:patient_id",
            get(history::list_for_patient),
        )
        .route(
            "/patientHistory/:id",
            get(history::detail).delete(history::delete),
        )
}

fn remote_routes() -> Router<ApiContext> {
    Router::new()
        .route("/patientCount", get(patients::count))
        .route(
            "/patients",
            get(patients::list_with_latest).post(patients::create),
        )
        .route(
            "/patient/:id",
            get(patients::detail)
                .patch(patients::update)
                .delete(patients::delete_remote),
        )
        .route(
            "/patientHistorys/:patient_id",
            get(history::list_for_patient).post(history::create),
        )
        .route(
            "/patientHistory/:id",
            axum::routing::delete(history::delete_remote),
        )
}
