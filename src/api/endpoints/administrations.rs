//! Administration Ledger endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use serde::Deserialize;
use uuid::Uuid;

use crate::administration::RecordedAdministration;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::archive::AdministrationArchiveEntry;
use crate::db::now_timestamp;
use crate::models::enums::{AdministrationAction, Shift};
use crate::models::{AdministrationFilter, NewAdministration};

#[derive(Deserialize)]
pub struct RecordBody {
    pub medication_id: Uuid,
    pub action: AdministrationAction,
    pub shift: Shift,
    pub staff_id: Uuid,
    pub notes: Option<String>,
    /// Defaults to the time the request is handled.
    pub administered_at: Option<NaiveDateTime>,
}

/// `POST /api/administrations`
pub async fn record(
    State(ctx): State<ApiContext>,
    body: Result<Json<RecordBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RecordedAdministration>), ApiError> {
    let Json(body) = body?;
    let input = NewAdministration {
        medication_id: body.medication_id,
        action: body.action,
        shift: body.shift,
        staff_id: body.staff_id,
        notes: body.notes,
        administered_at: body.administered_at.unwrap_or_else(now_timestamp),
    };
    let recorded = ctx.run(move |state| state.record_administration(&input)).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// `GET /api/administrations`: archive view.
pub async fn list(
    State(ctx): State<ApiContext>,
    filter: Result<Query<AdministrationFilter>, QueryRejection>,
) -> Result<Json<Vec<AdministrationArchiveEntry>>, ApiError> {
    let Query(filter) = filter?;
    Ok(Json(ctx.run(move |state| state.list_administrations(&filter)).await?))
}
