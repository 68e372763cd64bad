//! Read and subscribe access to the table that tracks remote generation jobs.
//!
//! The generation pipeline writes one row per `task_uuid`; this side only
//! observes it, either by reading it ([`JobStatusStore::get_status`]) or by
//! receiving a notification for every update ([`JobStatusStore::subscribe`]).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::job::JobStatus;

pub mod fanout;
pub mod memory;
pub mod postgres;

pub use fanout::StatusFanout;
pub use memory::MemoryStatusStore;
pub use postgres::PgStatusStore;

/// Buffer between a store's forwarding task and the subscriber.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 16;

#[async_trait]
pub trait JobStatusStore: Send + Sync {
    /// Current status of `task_id`. A task the pipeline has not written yet
    /// reads as [`JobStatus::Pending`].
    async fn get_status(&self, task_id: &str) -> Result<JobStatus, StoreError>;

    /// Register for every status update of `task_id`. Dropping the returned
    /// [`Subscription`] unsubscribes.
    async fn subscribe(&self, task_id: &str) -> Result<Subscription, StoreError>;
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Stream of status updates scoped to one task.
pub struct Subscription {
    task_id: String,
    updates: mpsc::Receiver<JobStatus>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    pub fn new(task_id: impl Into<String>, updates: mpsc::Receiver<JobStatus>) -> Self {
        Self {
            task_id: task_id.into(),
            updates,
            release: None,
        }
    }

    /// Run `release` when the subscription is dropped.
    pub fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Next update, or `None` once the store side has gone away.
    pub async fn recv(&mut self) -> Option<JobStatus> {
        self.updates.recv().await
    }

    /// An update that is already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<JobStatus> {
        self.updates.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!(task_id = %self.task_id, "Releasing status subscription");
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed status record: {0}")]
    Malformed(String),

    #[error("Status store unavailable: {0}")]
    Unavailable(String),
}
