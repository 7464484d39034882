//! Route modules for the annotation server

pub mod annotations;
pub mod health;
pub mod labels;
pub mod session;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/health", health::router())
        .route("/api/v1/health", get(health::health_check))
        .nest("/api/v1/annotations", annotations::router())
        .nest("/api/v1/labels", labels::router())
        .nest("/api/v1/session", session::router())
        .route("/api/v1/taxonomy", get(session::taxonomy))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
