use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::generation::GenerationPayload;
use crate::models::video::{VideoAccepted, VideoRequest, VideoTaskView};

/// POST /api/v1/videos - Submit a video job and start watching it.
pub async fn submit_video(
    State(state): State<AppState>,
    Json(request): Json<VideoRequest>,
) -> ApiResult<(StatusCode, Json<VideoAccepted>)> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let task_uuid = Uuid::new_v4();
    let payload = GenerationPayload::video(
        request.user_id,
        task_uuid,
        request.image_url,
        request.video_description,
        request.options,
    );

    state.generation.submit(&payload).await?;
    let watch_state = state.watches.start(task_uuid).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(VideoAccepted {
            task_uuid,
            state: watch_state,
            message: "Video generation started".to_string(),
        }),
    ))
}

/// GET /api/v1/videos/{task_uuid} - Current state of a video job.
pub async fn get_video(
    State(state): State<AppState>,
    Path(task_uuid): Path<Uuid>,
) -> ApiResult<Json<VideoTaskView>> {
    state
        .watches
        .view(task_uuid)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(task_uuid.to_string()))
}

/// DELETE /api/v1/videos/{task_uuid} - Stop watching a video job.
pub async fn cancel_video(
    State(state): State<AppState>,
    Path(task_uuid): Path<Uuid>,
) -> ApiResult<StatusCode> {
    match state.watches.cancel(task_uuid).await {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError::NotFound(task_uuid.to_string())),
    }
}
