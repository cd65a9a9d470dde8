//! MedicationRecord Store endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::custody::CustodyVerification;
use crate::models::{CustodyRecord, Medication, NewMedication};

#[derive(Deserialize)]
pub struct MedListQuery {
    pub resident_id: Option<Uuid>,
    #[serde(default)]
    pub include_discontinued: bool,
}

/// `GET /api/medications`
pub async fn list(
    State(ctx): State<ApiContext>,
    query: Result<Query<MedListQuery>, QueryRejection>,
) -> Result<Json<Vec<Medication>>, ApiError> {
    let Query(query) = query?;
    let meds = ctx
        .run(move |state| {
            state.list_medications(query.resident_id.as_ref(), query.include_discontinued)
        })
        .await?;
    Ok(Json(meds))
}

/// `POST /api/medications`
pub async fn register(
    State(ctx): State<ApiContext>,
    body: Result<Json<NewMedication>, JsonRejection>,
) -> Result<(StatusCode, Json<Medication>), ApiError> {
    let Json(body) = body?;
    let med = ctx.run(move |state| state.register_medication(&body)).await?;
    Ok((StatusCode::CREATED, Json(med)))
}

#[derive(Serialize)]
pub struct CountResponse {
    pub medication_id: Uuid,
    pub current_count: i64,
}

/// `GET /api/medications/:id/count`
pub async fn count(
    State(ctx): State<ApiContext>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CountResponse>, ApiError> {
    let Path(id) = id?;
    let current_count = ctx.run(move |state| state.get_current_count(&id)).await?;
    Ok(Json(CountResponse {
        medication_id: id,
        current_count,
    }))
}

#[derive(Deserialize)]
pub struct DiscontinueBody {
    pub staff_id: Uuid,
}

/// `POST /api/medications/:id/discontinue`
pub async fn discontinue(
    State(ctx): State<ApiContext>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<DiscontinueBody>, JsonRejection>,
) -> Result<Json<Medication>, ApiError> {
    let (Path(id), Json(body)) = (id?, body?);
    let med = ctx
        .run(move |state| state.discontinue_medication(&id, &body.staff_id))
        .await?;
    Ok(Json(med))
}

#[derive(Deserialize)]
pub struct ReactivateBody {
    pub staff_id: Uuid,
    pub restocked_count: i64,
}

/// `POST /api/medications/:id/reactivate`
pub async fn reactivate(
    State(ctx): State<ApiContext>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ReactivateBody>, JsonRejection>,
) -> Result<Json<Medication>, ApiError> {
    let (Path(id), Json(body)) = (id?, body?);
    let med = ctx
        .run(move |state| state.reactivate_medication(&id, &body.staff_id, body.restocked_count))
        .await?;
    Ok(Json(med))
}

/// `GET /api/medications/:id/custody`
pub async fn custody(
    State(ctx): State<ApiContext>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<CustodyRecord>>, ApiError> {
    let Path(id) = id?;
    Ok(Json(ctx.run(move |state| state.custody_history(&id)).await?))
}

/// `GET /api/medications/:id/custody/verify`
pub async fn verify(
    State(ctx): State<ApiContext>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CustodyVerification>, ApiError> {
    let Path(id) = id?;
    Ok(Json(ctx.run(move |state| state.verify_custody_chain(&id)).await?))
}
