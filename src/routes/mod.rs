use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod metrics;
pub mod shorts;
pub mod videos;

/// Headroom for multipart boundaries and text fields on top of the image.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// API routes. `/metrics` is mounted separately by the binary because it
/// needs the Prometheus handle.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/shorts", post(shorts::generate_short))
        .route("/api/v1/videos", post(videos::submit_video))
        .route(
            "/api/v1/videos/{task_uuid}",
            get(videos::get_video).delete(videos::cancel_video),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
