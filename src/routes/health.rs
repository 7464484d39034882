//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    /// Whether the last autosave succeeded
    pub persistence_ok: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let persistence_ok = state.session().last_persist_error().is_none();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "transcript-annotator",
        persistence_ok,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}
