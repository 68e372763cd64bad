use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::status_store::StoreError;

/// Status of a remote generation job as seen in the status store.
///
/// `Completed` and `Error` are terminal: once a job reaches either one it
/// never transitions again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed { result_url: String },
    Error { error_message: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    /// Wire name of the status column.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Error { .. } => "error",
        }
    }
}

/// A `video_tasks` row, or the JSON the status trigger publishes for one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusRow {
    pub task_uuid: String,
    pub status: String,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobStatusRow {
    /// Convert the flat row into a [`JobStatus`], enforcing that a result URL
    /// accompanies `completed` and an error message accompanies `error`.
    pub fn into_status(self) -> Result<JobStatus, StoreError> {
        match self.status.as_str() {
            "pending" | "processing" => Ok(JobStatus::Pending),
            "completed" => match self.result_url {
                Some(result_url) if !result_url.is_empty() => Ok(JobStatus::Completed { result_url }),
                _ => Err(StoreError::Malformed(format!(
                    "task {} is completed but has no result_url",
                    self.task_uuid
                ))),
            },
            // Failed rows without a message still terminate the job.
            "error" | "failed" => Ok(JobStatus::Error {
                error_message: self
                    .error_message
                    .unwrap_or_else(|| "generation failed".to_string()),
            }),
            other => Err(StoreError::Malformed(format!(
                "task {} has unknown status '{}'",
                self.task_uuid, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, result_url: Option<&str>, error_message: Option<&str>) -> JobStatusRow {
        JobStatusRow {
            task_uuid: "abc-123".to_string(),
            status: status.to_string(),
            result_url: result_url.map(str::to_string),
            error_message: error_message.map(str::to_string),
            updated_at: None,
        }
    }

    #[test]
    fn completed_row_carries_result_url() {
        let status = row("completed", Some("https://x/video.mp4"), None)
            .into_status()
            .unwrap();
        assert_eq!(
            status,
            JobStatus::Completed {
                result_url: "https://x/video.mp4".to_string()
            }
        );
        assert!(status.is_terminal());
    }

    #[test]
    fn completed_row_without_url_is_malformed() {
        let err = row("completed", None, None).into_status().unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn error_row_defaults_message() {
        let status = row("error", None, None).into_status().unwrap();
        assert_eq!(
            status,
            JobStatus::Error {
                error_message: "generation failed".to_string()
            }
        );
    }

    #[test]
    fn processing_is_not_terminal() {
        let status = row("processing", None, None).into_status().unwrap();
        assert!(!status.is_terminal());
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(row("queued-ish", None, None).into_status().is_err());
    }

    #[test]
    fn serializes_as_tagged_status() {
        let json = serde_json::to_value(JobStatus::Error {
            error_message: "timed out".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_message"], "timed out");
    }

    #[test]
    fn trigger_payload_deserializes() {
        let payload = r#"{"task_uuid":"abc-123","status":"completed","result_url":"https://x/v.mp4","error_message":null}"#;
        let row: JobStatusRow = serde_json::from_str(payload).unwrap();
        assert_eq!(row.task_uuid, "abc-123");
        assert!(row.into_status().unwrap().is_terminal());
    }
}
