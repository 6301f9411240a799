// Router definition

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use judge_engine::executor::{MAX_SOURCE_CODE_BYTES, MAX_TEST_INPUT_BYTES};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

/// Largest accepted request body. Room for the biggest source and one
/// maximal test input even when JSON escaping doubles it, so the executor's
/// own size checks are what callers hit first.
pub const MAX_REQUEST_BODY_BYTES: usize = MAX_SOURCE_CODE_BYTES + 2 * MAX_TEST_INPUT_BYTES;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/execute",
            post(handlers::execute).layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES)),
        )
        .route("/api/languages", get(handlers::list_languages))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
}
