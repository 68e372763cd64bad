//! Waits for a remote generation job to finish.
//!
//! [`TaskCompletionWatcher::start_watch`] reads the task's status once and,
//! unless it is already terminal, keeps observing it through a [`Sensor`]
//! (push notifications or a fixed-interval poll) until it completes, fails,
//! times out or is cancelled. The outcome callback runs at most once per
//! watch, and every exit path releases the sensor.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::job::JobStatus;
use crate::services::status_store::JobStatusStore;

mod driver;
mod handle;
pub mod sensor;

use driver::Driver;
pub(crate) use handle::WatchShared;
pub use handle::{WatchHandle, WatchState};
pub use sensor::{PollSensor, PushSensor, Sensor};

/// Message reported for a watch that ran out of time.
pub const TIMEOUT_MESSAGE: &str = "timed out";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How a watch learns about status changes. Fixed for the life of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WatchMode {
    Push,
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Overall budget, measured from watch start.
    pub timeout: Duration,
    /// Poll cadence. In push mode, the delay before retrying a failed
    /// subscription.
    pub poll_interval: Duration,
    pub mode: WatchMode,
}

impl WatchOptions {
    pub fn from_millis(timeout_ms: u64, poll_interval_ms: u64, mode: WatchMode) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(poll_interval_ms),
            mode,
        }
    }

    pub fn with_mode(mut self, mode: WatchMode) -> Self {
        self.mode = mode;
        self
    }

    fn validate(&self) -> Result<(), WatchError> {
        if self.timeout.is_zero() {
            return Err(WatchError::InvalidArgument(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(WatchError::InvalidArgument(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            mode: WatchMode::Push,
        }
    }
}

/// How a watch ended. Cancellation is not an outcome: a cancelled watch
/// delivers nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Completed { result_url: String },
    /// The job itself reported `error`.
    Failed { message: String },
    /// No terminal status was seen within the timeout.
    TimedOut,
}

impl WatchOutcome {
    /// Terminal outcome for `status`, `None` while the job is still pending.
    pub fn from_status(status: JobStatus) -> Option<Self> {
        match status {
            JobStatus::Pending => None,
            JobStatus::Completed { result_url } => Some(WatchOutcome::Completed { result_url }),
            JobStatus::Error { error_message } => Some(WatchOutcome::Failed {
                message: error_message,
            }),
        }
    }

    pub fn state(&self) -> WatchState {
        match self {
            WatchOutcome::Completed { .. } => WatchState::Completed,
            WatchOutcome::Failed { .. } => WatchState::Failed,
            WatchOutcome::TimedOut => WatchState::TimedOut,
        }
    }

    /// Status as the caller sees it: a timeout reads as `error`.
    pub fn status(&self) -> &'static str {
        match self {
            WatchOutcome::Completed { .. } => "completed",
            WatchOutcome::Failed { .. } | WatchOutcome::TimedOut => "error",
        }
    }

    pub fn result_url(&self) -> Option<&str> {
        match self {
            WatchOutcome::Completed { result_url } => Some(result_url),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            WatchOutcome::Completed { .. } => None,
            WatchOutcome::Failed { message } => Some(message),
            WatchOutcome::TimedOut => Some(TIMEOUT_MESSAGE),
        }
    }

    pub fn into_job_status(self) -> JobStatus {
        match self {
            WatchOutcome::Completed { result_url } => JobStatus::Completed { result_url },
            WatchOutcome::Failed { message } => JobStatus::Error {
                error_message: message,
            },
            WatchOutcome::TimedOut => JobStatus::Error {
                error_message: TIMEOUT_MESSAGE.to_string(),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Invalid watch request: {0}")]
    InvalidArgument(String),
}

/// Starts watches against one status store.
#[derive(Clone)]
pub struct TaskCompletionWatcher {
    store: Arc<dyn JobStatusStore>,
}

impl TaskCompletionWatcher {
    pub fn new(store: Arc<dyn JobStatusStore>) -> Self {
        Self { store }
    }

    /// Start watching `task_id`.
    ///
    /// Argument errors are returned immediately. Everything else, including
    /// remote failures and the timeout, arrives through `on_outcome`, which
    /// runs on the watch's own task. Must be called within a Tokio runtime.
    pub fn start_watch<F>(
        &self,
        task_id: &str,
        options: WatchOptions,
        on_outcome: F,
    ) -> Result<WatchHandle, WatchError>
    where
        F: FnOnce(WatchOutcome) + Send + 'static,
    {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(WatchError::InvalidArgument(
                "task id must not be empty".to_string(),
            ));
        }
        options.validate()?;

        let started = Instant::now();
        let shared = Arc::new(WatchShared::new());
        let cancel = CancellationToken::new();

        let sensor: Box<dyn Sensor> = match options.mode {
            WatchMode::Push => Box::new(PushSensor::new(
                self.store.clone(),
                task_id,
                options.poll_interval,
            )),
            WatchMode::Poll => Box::new(PollSensor::new(
                self.store.clone(),
                task_id,
                options.poll_interval,
                started,
            )),
        };

        let driver = Driver {
            task_id: task_id.to_string(),
            store: self.store.clone(),
            sensor,
            started,
            deadline: started + options.timeout,
            shared: shared.clone(),
            cancel: cancel.clone(),
            on_outcome: Some(Box::new(on_outcome)),
        };
        tokio::spawn(driver.run());

        metrics::counter!("watch_started_total", "mode" => options.mode.to_string()).increment(1);
        tracing::info!(
            task_id,
            mode = %options.mode,
            timeout_ms = options.timeout.as_millis() as u64,
            poll_interval_ms = options.poll_interval.as_millis() as u64,
            "Watch started"
        );

        Ok(WatchHandle::new(
            task_id.to_string(),
            options.mode,
            started,
            shared,
            cancel,
        ))
    }

    /// Stop a watch without an outcome. Idempotent.
    pub fn cancel_watch(&self, handle: &WatchHandle) -> bool {
        handle.cancel()
    }

    /// Watch `task_id` and wait for the outcome.
    ///
    /// Returns `None` only if the watch ended without delivering, which
    /// cannot happen unless its task was torn down with the runtime.
    pub async fn watch(
        &self,
        task_id: &str,
        options: WatchOptions,
    ) -> Result<Option<WatchOutcome>, WatchError> {
        let (tx, rx) = oneshot::channel();
        let handle = self.start_watch(task_id, options, move |outcome| {
            let _ = tx.send(outcome);
        })?;

        let outcome = rx.await.ok();
        drop(handle);
        Ok(outcome)
    }
}
