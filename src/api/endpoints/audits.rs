//! Audit Engine and Approval Gate endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::archive::AuditArchiveEntry;
use crate::audit::{AuditView, ProgramScope};
use crate::models::enums::ReviewDecision;
use crate::models::{AuditArchiveFilter, NewAuditSubmission, ReviewRequest};

/// `POST /api/audits`
pub async fn submit(
    State(ctx): State<ApiContext>,
    body: Result<Json<NewAuditSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<AuditView>), ApiError> {
    let Json(body) = body?;
    let view = ctx.run(move |state| state.submit_audit(&body)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Deserialize)]
pub struct PendingQuery {
    pub program_id: Option<Uuid>,
}

/// `GET /api/audits/pending`: reviewer queue, oldest first.
pub async fn pending(
    State(ctx): State<ApiContext>,
    query: Result<Query<PendingQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditView>>, ApiError> {
    let Query(query) = query?;
    let scope = ProgramScope::from_program(query.program_id);
    Ok(Json(ctx.run(move |state| state.list_pending_audits(scope)).await?))
}

/// `GET /api/audits/archive`: approved and denied audits.
pub async fn archive(
    State(ctx): State<ApiContext>,
    filter: Result<Query<AuditArchiveFilter>, QueryRejection>,
) -> Result<Json<Vec<AuditArchiveEntry>>, ApiError> {
    let Query(filter) = filter?;
    Ok(Json(ctx.run(move |state| state.list_decided_audits(&filter)).await?))
}

/// `GET /api/audits/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AuditView>, ApiError> {
    let Path(id) = id?;
    Ok(Json(ctx.run(move |state| state.get_audit(id)).await?))
}

#[derive(Deserialize)]
pub struct DecisionBody {
    pub reviewer_id: Uuid,
    pub decision: ReviewDecision,
    pub review_notes: Option<String>,
}

/// `POST /api/audits/:id/decision`
pub async fn decide(
    State(ctx): State<ApiContext>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<DecisionBody>, JsonRejection>,
) -> Result<Json<AuditView>, ApiError> {
    let (Path(id), Json(body)) = (id?, body?);
    let request = ReviewRequest {
        audit_id: id,
        reviewer_id: body.reviewer_id,
        decision: body.decision,
        review_notes: body.review_notes,
    };
    Ok(Json(ctx.run(move |state| state.decide(&request)).await?))
}
