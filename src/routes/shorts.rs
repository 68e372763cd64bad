use axum::extract::{Multipart, State};
use axum::Json;

use crate::app_state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::generation::{GenerationOptions, GenerationPayload, SubmitResponse};
use crate::models::video::ShortResponse;
use crate::services::upload::ImageUpload;

/// POST /api/v1/shorts - Upload an image and generate a short from it.
///
/// Multipart fields: `image` (required), `user_id` (required), `estilo`
/// and `duracao` (optional overrides of the default viral style).
pub async fn generate_short(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ShortResponse>> {
    let mut image: Option<ImageUpload> = None;
    let mut user_id: Option<String> = None;
    let mut options = GenerationOptions::viral_short();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;

                image = Some(ImageUpload::from_parts(
                    file_name.as_deref(),
                    content_type.as_deref(),
                    data.to_vec(),
                    state.max_upload_bytes,
                )?);
            }
            Some("user_id") => user_id = Some(text(field).await?),
            Some("estilo") => options.style = Some(text(field).await?),
            Some("duracao") => {
                let value = text(field).await?;
                options.duration = Some(value.trim().parse().map_err(|_| {
                    ApiError::BadRequest(format!("duracao must be a whole number of seconds, got '{value}'"))
                })?);
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| ApiError::BadRequest("missing 'image' field".to_string()))?;
    let user_id = user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing 'user_id' field".to_string()))?;

    tracing::info!(
        user_id = %user_id,
        file_name = %image.file_name,
        mime_type = image.mime_type(),
        size_bytes = image.data.len(),
        "Image accepted for short generation"
    );

    let payload = GenerationPayload::image(user_id, image.to_base64(), image.file_name.clone(), options);

    let response = match state.generation.submit(&payload).await? {
        SubmitResponse::Inline(results) => ShortResponse {
            file_name: image.file_name,
            results,
            message: "Short generated".to_string(),
        },
        SubmitResponse::Accepted(ack) => ShortResponse {
            file_name: image.file_name,
            results: vec![ack],
            message: "Short accepted, the video will be ready soon".to_string(),
        },
    };

    Ok(Json(response))
}

async fn text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}
