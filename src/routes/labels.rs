//! Document label API routes

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::annotations::DocumentLabels;
use crate::error::{AppError, Result};
use crate::session::LabelUpdate;
use crate::state::AppState;
use crate::suggest::JudgeSuggestion;

/// Create the labels router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:document_id", get(get_labels).put(put_labels))
        .route("/:document_id/status", get(label_status))
        .route("/:document_id/judge", post(apply_judge_output))
}

#[derive(Debug, Serialize)]
struct LabelsResponse {
    labels: DocumentLabels,
    /// Records dropped because the change voided them
    removed_records: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    document_id: String,
    labeled: bool,
    complete: bool,
}

#[derive(Debug, Deserialize)]
struct JudgeRequest {
    judge_output: String,
}

#[derive(Debug, Serialize)]
struct JudgeResponse {
    suggestion: JudgeSuggestion,
    labels: DocumentLabels,
}

async fn get_labels(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentLabels>> {
    let labels = state
        .session()
        .labels(&document_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("No labels for document: {}", document_id)))?;
    Ok(Json(labels))
}

async fn put_labels(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(update): Json<LabelUpdate>,
) -> Result<Json<LabelsResponse>> {
    let document = document_id.clone();
    let (removed, labels) = state
        .mutate(move |session| {
            let removed = session.apply_labels(&document, update);
            (removed, session.labels(&document).cloned())
        })
        .await?;
    let labels = labels
        .ok_or_else(|| AppError::Internal(format!("Labels missing after update: {}", document_id)))?;

    Ok(Json(LabelsResponse {
        labels,
        removed_records: removed.into_iter().map(|r| r.id).collect(),
    }))
}

async fn label_status(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Json<StatusResponse> {
    let session = state.session();
    let labels = session.labels(&document_id);
    Json(StatusResponse {
        labeled: labels.is_some(),
        complete: labels.is_some_and(DocumentLabels::is_complete),
        document_id,
    })
}

/// Pre-fill missing labels from a reviewer's output
async fn apply_judge_output(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(request): Json<JudgeRequest>,
) -> Result<Json<JudgeResponse>> {
    let (suggestion, labels) = state
        .mutate(move |session| {
            let suggestion = session.apply_judge_output(&document_id, &request.judge_output);
            (suggestion, session.labels(&document_id).cloned().unwrap_or_default())
        })
        .await?;
    let suggestion = suggestion
        .ok_or_else(|| AppError::BadRequest("Judge output contains no recognizable verdicts".to_string()))?;
    Ok(Json(JudgeResponse { suggestion, labels }))
}
