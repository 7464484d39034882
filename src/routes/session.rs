//! Session API routes: status, save, load, export and clear

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::persist::{ExportDocument, SaveFile};
use crate::session::LoadSummary;
use crate::state::AppState;
use crate::taxonomy::Taxonomy;

/// Create the session router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(session_status))
        .route("/save", get(save_file))
        .route("/export", get(export))
        .route("/load", post(load))
        .route("/clear", post(clear))
}

#[derive(Debug, Serialize)]
struct SessionStatus {
    session_id: String,
    documents: usize,
    records: usize,
    /// Where autosaves go
    save_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_persist_error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClearRequest {
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    cleared: bool,
}

async fn session_status(State(state): State<AppState>) -> Json<SessionStatus> {
    let session = state.session();
    Json(SessionStatus {
        session_id: session.id().to_string(),
        documents: session.store().document_ids().len(),
        records: session.store().record_count(),
        save_path: state.config().storage.save_path.display().to_string(),
        last_persist_error: session.last_persist_error().map(str::to_string),
    })
}

/// Current snapshot in save file form
async fn save_file(State(state): State<AppState>) -> Json<SaveFile> {
    Json(state.session().save_file())
}

async fn export(State(state): State<AppState>) -> Json<ExportDocument> {
    let document = state.session().export();
    tracing::info!(
        session = %document.session_id,
        annotated = document.annotated_document_count,
        "Exported annotations"
    );
    Json(document)
}

/// Replace the session with an uploaded save file. The body is the raw
/// save file JSON; a rejected file leaves the session as it was.
async fn load(State(state): State<AppState>, body: String) -> Result<Json<LoadSummary>> {
    let summary = state
        .mutate(move |session| session.load_save_str(&body))
        .await??;
    Ok(Json(summary))
}

async fn clear(
    State(state): State<AppState>,
    Json(request): Json<ClearRequest>,
) -> Result<Json<ClearResponse>> {
    if !request.confirm {
        return Err(AppError::BadRequest(
            "Clearing all annotations requires {\"confirm\": true}".to_string(),
        ));
    }
    state.mutate(|session| session.clear_all()).await?;
    Ok(Json(ClearResponse { cleared: true }))
}

/// Active taxonomy
pub async fn taxonomy(State(state): State<AppState>) -> Json<Taxonomy> {
    Json(state.session().taxonomy().clone())
}
