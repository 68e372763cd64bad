use serde::Deserialize;

use crate::services::upload::DEFAULT_MAX_UPLOAD_BYTES;
use crate::watcher::{WatchMode, WatchOptions};

/// Where job statuses are read from.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Required for the postgres backend.
    pub database_url: Option<String>,

    #[serde(default = "default_status_backend")]
    pub status_backend: StatusBackend,

    /// Base URL of the automation server hosting the webhook
    pub api_base_url: String,

    /// Webhook path appended to `api_base_url`
    pub webhook_gera_shorts: String,

    /// push (table notifications) or poll (periodic reads)
    #[serde(default = "default_watch_mode")]
    pub watch_mode: WatchMode,

    #[serde(default = "default_watch_timeout_ms")]
    pub watch_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_status_backend() -> StatusBackend {
    StatusBackend::Postgres
}

fn default_watch_mode() -> WatchMode {
    WatchMode::Push
}

fn default_watch_timeout_ms() -> u64 {
    10 * 60 * 1000
}

fn default_poll_interval_ms() -> u64 {
    10 * 1000
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Full webhook URL, joining base and path with exactly one slash.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.webhook_gera_shorts.trim_start_matches('/')
        )
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions::from_millis(self.watch_timeout_ms, self.poll_interval_ms, self.watch_mode)
    }
}
