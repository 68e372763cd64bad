use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Kind of job the generation webhook should run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
pub enum GenerationType {
    #[serde(rename = "imagem")]
    #[strum(serialize = "imagem")]
    Image,
    #[serde(rename = "video")]
    #[strum(serialize = "video")]
    Video,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

/// Style options forwarded to the webhook as `opcoes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GenerationOptions {
    #[garde(length(min = 1, max = 64))]
    #[serde(rename = "estilo", skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    /// Target duration in seconds.
    #[garde(range(min = 1, max = 600))]
    #[serde(rename = "duracao", skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,

    #[garde(skip)]
    #[serde(rename = "qualidade", skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,

    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,

    /// Any further pipeline-specific knobs, passed through untouched.
    #[garde(skip)]
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerationOptions {
    /// Defaults the upload page sends with image jobs.
    pub fn viral_short() -> Self {
        Self {
            style: Some("viral".to_string()),
            duration: Some(30),
            ..Default::default()
        }
    }
}

/// JSON body POSTed to the generation webhook.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationPayload {
    #[garde(skip)]
    pub generation_type: GenerationType,

    /// Caller-generated id the status store is keyed by (video jobs).
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_uuid: Option<Uuid>,

    /// Bare base64 image body, without a `data:` prefix.
    #[garde(length(min = 1))]
    #[serde(rename = "imagem_base64", skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,

    #[garde(length(min = 1, max = 255))]
    #[serde(rename = "imagem_nome", skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    #[garde(length(min = 1, max = 2000))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_description: Option<String>,

    #[garde(length(min = 1, max = 2048))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[garde(length(min = 1, max = 200))]
    pub user_id: String,

    #[garde(dive)]
    #[serde(rename = "opcoes", skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,
}

impl GenerationPayload {
    pub fn image(
        user_id: impl Into<String>,
        image_base64: String,
        image_name: impl Into<String>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            generation_type: GenerationType::Image,
            task_uuid: None,
            image_base64: Some(image_base64),
            image_name: Some(image_name.into()),
            video_description: None,
            image_url: None,
            user_id: user_id.into(),
            options: Some(options),
        }
    }

    pub fn video(
        user_id: impl Into<String>,
        task_uuid: Uuid,
        image_url: Option<String>,
        video_description: impl Into<String>,
        options: Option<GenerationOptions>,
    ) -> Self {
        Self {
            generation_type: GenerationType::Video,
            task_uuid: Some(task_uuid),
            image_base64: None,
            image_name: None,
            video_description: Some(video_description.into()),
            image_url,
            user_id: user_id.into(),
            options,
        }
    }

    /// Field-level checks plus the rules tied to `generation_type`.
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;

        match self.generation_type {
            GenerationType::Image if self.image_base64.is_none() => {
                Err("image jobs require imagem_base64".to_string())
            }
            GenerationType::Video if self.task_uuid.is_none() => {
                Err("video jobs require task_uuid".to_string())
            }
            GenerationType::Video if self.video_description.is_none() => {
                Err("video jobs require video_description".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// What the webhook answered.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResponse {
    /// Results produced synchronously (image path).
    Inline(Vec<serde_json::Value>),
    /// Job accepted for background processing (video path).
    Accepted(serde_json::Value),
}

impl SubmitResponse {
    /// Classify a raw response body. Non-JSON bodies are kept as a string.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Array(items)) => SubmitResponse::Inline(items),
            Ok(other) => SubmitResponse::Accepted(other),
            Err(_) => SubmitResponse::Accepted(serde_json::Value::String(body.to_string())),
        }
    }
}
