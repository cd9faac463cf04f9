//! Patient endpoints.
//!
//! Shared by both flows:
//! - `GET /patients`: list
//! - `GET /patient/:id`: single record
//!
//! Local flow (prediction on every write):
//! - `POST /patients`, `PATCH /patient/:id`, `DELETE /patient/:id`
//!
//! Remote flow (writes only, prediction is a separate call):
//! - `GET /patientCount`, `GET /patients` with latest prediction,
//!   `POST /patients`, `PATCH /patient/:id`, `DELETE /patient/:id`

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use crate::api::error::ApiError;
use crate::api::types::{
    today, ApiContext, CountResponse, PatientOverviewsResponse, PatientPredictionResponse,
    PatientsResponse, ResultResponse, SuccessResponse,
};
use crate::db;
use crate::models::{Patient, PatientPatch, PredictionOutcome};
use crate::prediction;

/// `GET /patients`: every stored patient.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<PatientsResponse>, ApiError> {
    let patients = ctx.with_db(|conn| Ok(db::list_patients(conn)?)).await?;
    Ok(Json(PatientsResponse { patients }))
}

/// `GET /patient/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<Patient>, ApiError> {
    let patient = ctx
        .with_db(move |conn| db::get_patient(conn, id)?.ok_or_else(ApiError::patient_not_found))
        .await?;
    Ok(Json(patient))
}

// ── Local flow ──────────────────────────────────────────────

/// `POST /patients`: create a patient, predict, and record the prediction.
pub async fn create_with_prediction(
    State(ctx): State<ApiContext>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<PatientPredictionResponse>), ApiError> {
    let Json(body) = payload?;
    let attrs = PatientPatch::from_json(&body, true)?.into_new_patient()?;

    let (patient, prediction) = ctx
        .in_transaction(move |conn, engine| {
            let outcome = prediction::predict_for(engine, &attrs)?;
            let rate = rate_of(&outcome)?;
            let patient = db::insert_patient(conn, &attrs)?;
            db::insert_prediction(conn, patient.id, &outcome, today())?;
            Ok((patient, rate))
        })
        .await?;

    tracing::info!(patient_id = patient.id, "Patient created");
    Ok((
        StatusCode::CREATED,
        Json(PatientPredictionResponse {
            patient,
            prediction,
        }),
    ))
}

/// `PATCH /patient/:id`: sparse update, then predict on the merged record.
pub async fn update_with_prediction(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PatientPredictionResponse>, ApiError> {
    let Json(body) = payload?;
    let patch = PatientPatch::from_json(&body, false)?;
    let fields = patch_len(&body);

    let (patient, prediction) = ctx
        .in_transaction(move |conn, engine| {
            let mut merged = db::get_patient(conn, id)?.ok_or_else(ApiError::patient_not_found)?;
            patch.apply(&mut merged.attributes)?;
            let outcome = prediction::predict_for(engine, &merged.attributes)?;
            let rate = rate_of(&outcome)?;
            let patient = db::update_patient(conn, id, &patch)?;
            db::insert_prediction(conn, patient.id, &outcome, today())?;
            Ok((patient, rate))
        })
        .await?;

    tracing::info!(patient_id = id, fields, "Patient updated");
    Ok(Json(PatientPredictionResponse { patient, prediction }))
}

/// `DELETE /patient/:id`: history rows are kept. Unknown ids are a no-op.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<ResultResponse>, ApiError> {
    remove_patient(&ctx, id).await?;
    Ok(Json(ResultResponse { result: "success" }))
}

// ── Remote flow ─────────────────────────────────────────────

/// `GET /patientCount`
pub async fn count(State(ctx): State<ApiContext>) -> Result<Json<CountResponse>, ApiError> {
    let count = ctx.with_db(|conn| Ok(db::count_patients(conn)?)).await?;
    Ok(Json(CountResponse { count }))
}

/// `GET /patients`: each patient with its most recent prediction, if any.
pub async fn list_with_latest(
    State(ctx): State<ApiContext>,
) -> Result<Json<PatientOverviewsResponse>, ApiError> {
    let patients = ctx
        .with_db(|conn| Ok(db::list_patients_with_latest(conn)?))
        .await?;
    Ok(Json(PatientOverviewsResponse { patients }))
}

/// `POST /patients`: create only.
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let Json(body) = payload?;
    let attrs = PatientPatch::from_json(&body, true)?.into_new_patient()?;
    let patient = ctx
        .with_db(move |conn| Ok(db::insert_patient(conn, &attrs)?))
        .await?;
    tracing::info!(patient_id = patient.id, "Patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `PATCH /patient/:id`: sparse update only.
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Patient>, ApiError> {
    let Json(body) = payload?;
    let patch = PatientPatch::from_json(&body, false)?;
    let patient = ctx
        .with_db(move |conn| Ok(db::update_patient(conn, id, &patch)?))
        .await?;
    tracing::info!(patient_id = id, fields = patch_len(&body), "Patient updated");
    Ok(Json(patient))
}

/// `DELETE /patient/:id`: history rows are kept. Unknown ids are a no-op.
pub async fn delete_remote(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    remove_patient(&ctx, id).await?;
    Ok(Json(SuccessResponse { success: "Patient deleted" }))
}

async fn remove_patient(ctx: &ApiContext, id: i64) -> Result<(), ApiError> {
    let removed = ctx
        .with_db(move |conn| Ok(db::delete_patient(conn, id)?))
        .await?;
    tracing::info!(patient_id = id, removed, "Patient delete");
    Ok(())
}

fn rate_of(outcome: &PredictionOutcome) -> Result<f64, ApiError> {
    outcome
        .rate()
        .ok_or_else(|| ApiError::Internal("Engine returned probabilities, expected a rate".into()))
}

fn patch_len(body: &Value) -> usize {
    body.as_object().map_or(0, |o| o.len())
}
