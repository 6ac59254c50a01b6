use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize;

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/upload-file",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/file-status/:uuid", get(handlers::file_status))
        .route("/get-results", get(handlers::get_results))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
