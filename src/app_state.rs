use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{generation::GenerationClient, watches::WatchRegistry};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Present when statuses come from Postgres.
    pub db: Option<PgPool>,
    pub generation: Arc<GenerationClient>,
    pub watches: Arc<WatchRegistry>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        db: Option<PgPool>,
        generation: GenerationClient,
        watches: WatchRegistry,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            db,
            generation: Arc::new(generation),
            watches: Arc::new(watches),
            max_upload_bytes,
        }
    }
}
