//! Strategies for observing a task's status.
//!
//! A [`Sensor`] turns "somebody changed the row" into a stream of
//! [`JobStatus`] values for the driver. [`PollSensor`] re-reads the store on a
//! fixed cadence; [`PushSensor`] waits for the store to notify it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::models::job::JobStatus;
use crate::services::status_store::{JobStatusStore, Subscription};

#[async_trait]
pub trait Sensor: Send {
    /// Acquire whatever the sensor observes through (timer, subscription).
    async fn start(&mut self);

    /// Wait for the next observed status. Failures to observe are absorbed
    /// here; the future only resolves with an actual status.
    async fn next_status(&mut self) -> JobStatus;

    /// Release the timer or subscription. Calling it again is a no-op.
    fn stop(&mut self);
}

/// Re-reads the status every `period`, starting one period after `anchor`.
pub struct PollSensor {
    store: Arc<dyn JobStatusStore>,
    task_id: String,
    period: Duration,
    anchor: Instant,
    ticker: Option<Interval>,
    attempts: u32,
}

impl PollSensor {
    pub fn new(
        store: Arc<dyn JobStatusStore>,
        task_id: impl Into<String>,
        period: Duration,
        anchor: Instant,
    ) -> Self {
        Self {
            store,
            task_id: task_id.into(),
            period,
            anchor,
            ticker: None,
            attempts: 0,
        }
    }

    /// Number of reads performed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[async_trait]
impl Sensor for PollSensor {
    async fn start(&mut self) {
        let mut ticker = tokio::time::interval_at(self.anchor + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    async fn next_status(&mut self) -> JobStatus {
        loop {
            match self.ticker.as_mut() {
                Some(ticker) => {
                    ticker.tick().await;
                }
                None => std::future::pending::<()>().await,
            }

            self.attempts += 1;
            metrics::counter!("watch_poll_attempts_total").increment(1);

            match self.store.get_status(&self.task_id).await {
                Ok(status) => {
                    tracing::debug!(
                        task_id = %self.task_id,
                        attempt = self.attempts,
                        status = status.as_str(),
                        "Polled task status"
                    );
                    return status;
                }
                Err(e) => {
                    metrics::counter!("watch_transient_failures_total").increment(1);
                    tracing::warn!(
                        task_id = %self.task_id,
                        attempt = self.attempts,
                        error = %e,
                        "Status poll failed, retrying on next tick"
                    );
                }
            }
        }
    }

    fn stop(&mut self) {
        if self.ticker.take().is_some() {
            tracing::debug!(task_id = %self.task_id, attempts = self.attempts, "Poll timer released");
        }
    }
}

/// Waits for store notifications about one task.
///
/// After subscribing it reads the status once, so a transition that landed
/// between the watch's first read and the subscription is still seen. A
/// failed or closed subscription is re-established every `retry_interval`.
pub struct PushSensor {
    store: Arc<dyn JobStatusStore>,
    task_id: String,
    retry_interval: Duration,
    subscription: Option<Subscription>,
    catch_up: Option<JobStatus>,
    stopped: bool,
}

impl PushSensor {
    pub fn new(
        store: Arc<dyn JobStatusStore>,
        task_id: impl Into<String>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            store,
            task_id: task_id.into(),
            retry_interval,
            subscription: None,
            catch_up: None,
            stopped: false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    async fn subscribe(&mut self) {
        match self.store.subscribe(&self.task_id).await {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                match self.store.get_status(&self.task_id).await {
                    Ok(status) if status.is_terminal() => self.catch_up = Some(status),
                    Ok(_) => {}
                    Err(e) => {
                        metrics::counter!("watch_transient_failures_total").increment(1);
                        tracing::warn!(task_id = %self.task_id, error = %e, "Catch-up status read failed");
                    }
                }
            }
            Err(e) => {
                metrics::counter!("watch_transient_failures_total").increment(1);
                tracing::warn!(
                    task_id = %self.task_id,
                    error = %e,
                    retry_in_ms = self.retry_interval.as_millis() as u64,
                    "Status subscription failed"
                );
            }
        }
    }
}

#[async_trait]
impl Sensor for PushSensor {
    async fn start(&mut self) {
        self.subscribe().await;
    }

    async fn next_status(&mut self) -> JobStatus {
        loop {
            if self.stopped {
                return std::future::pending().await;
            }
            if let Some(status) = self.catch_up.take() {
                return status;
            }

            match self.subscription.as_mut() {
                Some(subscription) => match subscription.recv().await {
                    Some(status) => return status,
                    None => {
                        tracing::warn!(task_id = %self.task_id, "Status channel closed, resubscribing");
                        self.subscription = None;
                    }
                },
                None => {
                    tokio::time::sleep(self.retry_interval).await;
                    self.subscribe().await;
                }
            }
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.catch_up = None;
        if let Some(subscription) = self.subscription.take() {
            drop(subscription);
        }
    }
}
