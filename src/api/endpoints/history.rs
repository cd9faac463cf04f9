//! Prediction-history endpoints.
//!
//! - `GET /patientHistorys/:patient_id`: all rows for a patient id
//! - `GET /patientHistory/:id`: single row (local flow)
//! - `POST /patientHistorys/:patient_id`: score remotely and store (remote flow)
//! - `DELETE /patientHistory/:id`
//!
//! Rows are keyed by patient id only, so history of a deleted patient is
//! still listed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{today, ApiContext, HistoryResponse, ResultResponse, SuccessResponse};
use crate::db;
use crate::models::PredictionRecord;

/// `GET /patientHistorys/:patient_id`
pub async fn list_for_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<i64>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = ctx
        .with_db(move |conn| Ok(db::list_predictions_for_patient(conn, patient_id)?))
        .await?;
    Ok(Json(HistoryResponse { history }))
}

/// `GET /patientHistory/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let record = ctx
        .with_db(move |conn| db::get_prediction(conn, id)?.ok_or_else(ApiError::history_not_found))
        .await?;
    Ok(Json(HistoryResponse {
        history: vec![record],
    }))
}

/// `POST /patientHistorys/:patient_id`: call the scorer for the stored
/// patient and append the result. Nothing is written when scoring fails.
pub async fn create(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<i64>,
) -> Result<(StatusCode, Json<PredictionRecord>), ApiError> {
    let patient = ctx
        .with_db(move |conn| {
            db::get_patient(conn, patient_id)?.ok_or_else(ApiError::patient_not_found)
        })
        .await?;

    let outcome = ctx.predict(patient.attributes).await?;

    let record = ctx
        .with_db(move |conn| Ok(db::insert_prediction(conn, patient_id, &outcome, today())?))
        .await?;
    tracing::info!(patient_id, history_id = record.id, "Prediction stored");
    Ok((StatusCode::CREATED, Json(record)))
}

/// `DELETE /patientHistory/:id` (local flow). Unknown ids are a no-op.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<ResultResponse>, ApiError> {
    remove_record(&ctx, id).await?;
    Ok(Json(ResultResponse { result: "success" }))
}

/// `DELETE /patientHistory/:id` (remote flow). Unknown ids are a no-op.
pub async fn delete_remote(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    remove_record(&ctx, id).await?;
    Ok(Json(SuccessResponse { success: "History deleted" }))
}

async fn remove_record(ctx: &ApiContext, id: i64) -> Result<(), ApiError> {
    let removed = ctx
        .with_db(move |conn| Ok(db::delete_prediction(conn, id)?))
        .await?;
    tracing::info!(history_id = id, removed, "History delete");
    Ok(())
}
