//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The kiosk page loads `/api/session` with the link's query parameters
//! before it builds the editor, and posts the finished design to
//! `/api/session/{id}/submit`. Everything else (image upload, rendering)
//! happens in the browser.

pub mod session;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/session", get(session::resolve_session))
        .route("/api/session/{id}/submit", post(session::submit_session))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
