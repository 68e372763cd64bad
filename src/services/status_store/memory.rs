//! In-process status store.
//!
//! Keeps the latest status per task in a map and routes every write to that
//! task's subscribers, so watches behave like they would against the
//! Postgres store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{JobStatusStore, StatusFanout, StoreError, Subscription};
use crate::models::job::JobStatus;

pub struct MemoryStatusStore {
    statuses: RwLock<HashMap<String, JobStatus>>,
    fanout: Arc<StatusFanout>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
            fanout: StatusFanout::new(),
        }
    }

    /// Record a new status for `task_id` and notify subscribers.
    pub async fn set_status(&self, task_id: &str, status: JobStatus) {
        self.statuses
            .write()
            .await
            .insert(task_id.to_string(), status.clone());

        // Zero subscribers is fine: nobody is watching this task yet.
        self.fanout.dispatch(task_id, &status);
    }

    /// Number of live subscriptions across all tasks.
    pub fn subscriber_count(&self) -> usize {
        self.fanout.subscriber_count()
    }
}

impl Default for MemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStatusStore for MemoryStatusStore {
    async fn get_status(&self, task_id: &str) -> Result<JobStatus, StoreError> {
        Ok(self
            .statuses
            .read()
            .await
            .get(task_id)
            .cloned()
            .unwrap_or(JobStatus::Pending))
    }

    async fn subscribe(&self, task_id: &str) -> Result<Subscription, StoreError> {
        Ok(self.fanout.register(task_id))
    }
}
