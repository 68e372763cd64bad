use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::generation::GenerationOptions;
use crate::watcher::WatchState;

/// Request to turn an image into a video.
#[derive(Debug, Deserialize, Validate)]
pub struct VideoRequest {
    #[garde(length(min = 1, max = 200))]
    pub user_id: String,

    #[garde(length(min = 1, max = 2048))]
    pub image_url: Option<String>,

    #[garde(length(min = 1, max = 2000))]
    pub video_description: String,

    #[garde(dive)]
    #[serde(rename = "opcoes", default)]
    pub options: Option<GenerationOptions>,
}

/// Response after a video job was accepted.
#[derive(Debug, Serialize)]
pub struct VideoAccepted {
    pub task_uuid: Uuid,
    pub state: WatchState,
    pub message: String,
}

/// Current view of a tracked video task.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoTaskView {
    pub task_uuid: Uuid,
    pub state: WatchState,
    pub active: bool,
    /// `pending`, `completed` or `error`; a timeout reads as `error`.
    pub status: String,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

/// Response for a synchronous image job.
#[derive(Debug, Serialize)]
pub struct ShortResponse {
    pub file_name: String,
    pub results: Vec<serde_json::Value>,
    pub message: String,
}
