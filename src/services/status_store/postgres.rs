use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{JobStatusStore, StatusFanout, StoreError, Subscription};
use crate::db::queries;
use crate::models::job::{JobStatus, JobStatusRow};

/// Channel the `video_tasks` trigger publishes row changes on.
pub const STATUS_CHANNEL: &str = "video_task_status";

/// Pause before receiving again after the listener connection failed.
const LISTENER_RETRY: Duration = Duration::from_secs(1);

/// Status store backed by the `video_tasks` table.
///
/// Reads go straight to the table. All subscriptions share a single `LISTEN`
/// connection, started on first use, whose notifications are routed by
/// `task_uuid`.
pub struct PgStatusStore {
    pool: PgPool,
    fanout: Arc<StatusFanout>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            fanout: StatusFanout::new(),
            listener: Mutex::new(None),
        }
    }

    /// Number of live subscriptions across all tasks.
    pub fn subscriber_count(&self) -> usize {
        self.fanout.subscriber_count()
    }

    async fn ensure_listener(&self) -> Result<(), StoreError> {
        let mut task = self.listener.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(STATUS_CHANNEL).await?;
        tracing::info!(channel = STATUS_CHANNEL, "Listening for status notifications");

        *task = Some(tokio::spawn(route_notifications(listener, self.fanout.clone())));
        Ok(())
    }
}

impl Drop for PgStatusStore {
    fn drop(&mut self) {
        if let Some(task) = self.listener.get_mut().take() {
            task.abort();
        }
    }
}

async fn route_notifications(mut listener: PgListener, fanout: Arc<StatusFanout>) {
    loop {
        let notification = match listener.recv().await {
            Ok(n) => n,
            Err(e) => {
                // Notifications may have been missed while disconnected.
                // Subscribers resubscribe and re-read the row.
                let closed = fanout.close_all();
                tracing::warn!(error = %e, closed, "Status listener failed, reconnecting");
                tokio::time::sleep(LISTENER_RETRY).await;
                continue;
            }
        };

        let row: JobStatusRow = match serde_json::from_str(notification.payload()) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unparseable status notification");
                continue;
            }
        };

        let task_uuid = row.task_uuid.clone();
        match row.into_status() {
            Ok(status) => {
                let delivered = fanout.dispatch(&task_uuid, &status);
                tracing::trace!(task_id = %task_uuid, delivered, "Routed status notification");
            }
            Err(e) => tracing::warn!(task_id = %task_uuid, error = %e, "Malformed status notification"),
        }
    }
}

#[async_trait]
impl JobStatusStore for PgStatusStore {
    async fn get_status(&self, task_id: &str) -> Result<JobStatus, StoreError> {
        match queries::get_task_status(&self.pool, task_id).await? {
            Some(row) => row.into_status(),
            None => Ok(JobStatus::Pending),
        }
    }

    async fn subscribe(&self, task_id: &str) -> Result<Subscription, StoreError> {
        self.ensure_listener().await?;
        tracing::debug!(task_id, channel = STATUS_CHANNEL, "Subscribed to status notifications");
        Ok(self.fanout.register(task_id))
    }
}
