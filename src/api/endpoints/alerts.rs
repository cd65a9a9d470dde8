//! Alert endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::alerts::AlertDraft;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::Alert;

#[derive(Deserialize)]
pub struct AlertListQuery {
    #[serde(default)]
    pub unresolved_only: bool,
}

/// `GET /api/alerts`
pub async fn list(
    State(ctx): State<ApiContext>,
    query: Result<Query<AlertListQuery>, QueryRejection>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(ctx.run(move |state| state.list_alerts(query.unresolved_only)).await?))
}

/// `POST /api/alerts`: manual alert.
pub async fn create(
    State(ctx): State<ApiContext>,
    draft: Result<Json<AlertDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Alert>), ApiError> {
    let Json(draft) = draft?;
    let alert = ctx.run(move |state| state.generate_alert(&draft)).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

/// `POST /api/alerts/:id/resolve`
pub async fn resolve(
    State(ctx): State<ApiContext>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Alert>, ApiError> {
    let Path(id) = id?;
    Ok(Json(ctx.run(move |state| state.resolve_alert(id)).await?))
}
