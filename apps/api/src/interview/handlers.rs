use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::context::ContextBundle;
use crate::interview::stage_machine::RecordAnalyticsInput;
use crate::models::candidate::{Candidate, Decision};
use crate::models::interview::{Analytics, Interview, Stage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartInterviewRequest {
    /// Defaults to the candidate's next stage.
    #[serde(default)]
    pub stage: Option<Stage>,
}

#[derive(Debug, Serialize)]
pub struct StartInterviewResponse {
    pub interview: Interview,
    pub context: ContextBundle,
}

#[derive(Debug, Serialize)]
pub struct NextStageResponse {
    pub candidate_id: Uuid,
    /// `None` once all three stages are complete.
    pub next_stage: Option<Stage>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
}

/// GET /api/v1/candidates/:id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Candidate>, AppError> {
    Ok(Json(state.store.get_candidate(id).await?))
}

/// GET /api/v1/candidates/:id/next-stage
pub async fn handle_next_stage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NextStageResponse>, AppError> {
    let next_stage = state.stages.next_stage(id).await?;
    Ok(Json(NextStageResponse {
        candidate_id: id,
        next_stage,
    }))
}

/// GET /api/v1/candidates/:id/interviews
pub async fn handle_list_interviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Interview>>, AppError> {
    Ok(Json(state.stages.interviews(id).await?))
}

/// POST /api/v1/candidates/:id/interviews
pub async fn handle_start_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<StartInterviewRequest>>,
) -> Result<Json<StartInterviewResponse>, AppError> {
    let stage = body.and_then(|Json(req)| req.stage);
    let (interview, context) = state.stages.start_interview(id, stage).await?;
    Ok(Json(StartInterviewResponse { interview, context }))
}

/// PATCH /api/v1/candidates/:id/decision
pub async fn handle_submit_decision(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<Candidate>, AppError> {
    Ok(Json(
        state
            .stages
            .submit_decision(id, req.decision, req.notes)
            .await?,
    ))
}

/// POST /api/v1/candidates/:id/archive
pub async fn handle_archive_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Candidate>, AppError> {
    let sink = state.archive.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Archiving requires S3_BUCKET to be configured".to_string())
    })?;
    Ok(Json(state.stages.archive_candidate(id, sink.as_ref()).await?))
}

/// POST /api/v1/interviews/:id/analytics
pub async fn handle_record_analytics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<RecordAnalyticsInput>,
) -> Result<Json<Analytics>, AppError> {
    Ok(Json(state.stages.record_analytics(id, input).await?))
}

/// POST /api/v1/interviews/:id/cancel
pub async fn handle_cancel_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Interview>, AppError> {
    Ok(Json(state.stages.cancel_interview(id).await?))
}
