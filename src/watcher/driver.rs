use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::handle::{WatchShared, WatchState};
use super::sensor::Sensor;
use super::WatchOutcome;
use crate::services::status_store::JobStatusStore;

pub(crate) type OutcomeCallback = Box<dyn FnOnce(WatchOutcome) + Send>;

/// The task that owns one watch: its sensor, its deadline and its callback.
///
/// Every event for the watch (a status, the deadline, a cancellation) is
/// handled inside this one task, so the first terminal event ends the loop
/// and nothing after it is observed.
pub(crate) struct Driver {
    pub(crate) task_id: String,
    pub(crate) store: Arc<dyn JobStatusStore>,
    pub(crate) sensor: Box<dyn Sensor>,
    pub(crate) started: Instant,
    pub(crate) deadline: Instant,
    pub(crate) shared: Arc<WatchShared>,
    pub(crate) cancel: CancellationToken,
    pub(crate) on_outcome: Option<OutcomeCallback>,
}

impl Driver {
    pub(crate) async fn run(mut self) {
        let outcome = self.observe().await;
        self.sensor.stop();

        match outcome {
            Some(outcome) => self.deliver(outcome),
            None => tracing::debug!(task_id = %self.task_id, "Watch ended without outcome"),
        }
    }

    /// Returns the terminal outcome, or `None` when the watch was cancelled.
    async fn observe(&mut self) -> Option<WatchOutcome> {
        let timeout = tokio::time::sleep_until(self.deadline);
        tokio::pin!(timeout);

        // The job may have finished before anyone started watching it.
        let initial = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            result = self.store.get_status(&self.task_id) => result,
            _ = &mut timeout => return Some(WatchOutcome::TimedOut),
        };
        match initial {
            Ok(status) => {
                if let Some(outcome) = WatchOutcome::from_status(status) {
                    tracing::debug!(task_id = %self.task_id, "Task already terminal on first check");
                    return Some(outcome);
                }
            }
            Err(e) => {
                metrics::counter!("watch_transient_failures_total").increment(1);
                tracing::warn!(
                    task_id = %self.task_id,
                    error = %e,
                    "Initial status check failed, observing anyway"
                );
            }
        }

        if !self.shared.begin_observing() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            _ = self.sensor.start() => {}
            _ = &mut timeout => return Some(WatchOutcome::TimedOut),
        }

        loop {
            // On a shared tick: cancellation first, then a fresh status, then
            // the deadline.
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                status = self.sensor.next_status() => {
                    if let Some(outcome) = WatchOutcome::from_status(status) {
                        return Some(outcome);
                    }
                    tracing::trace!(task_id = %self.task_id, "Non-terminal status ignored");
                }
                _ = &mut timeout => return Some(WatchOutcome::TimedOut),
            }
        }
    }

    fn deliver(&mut self, outcome: WatchOutcome) {
        let state = outcome.state();
        if !self.shared.finish(state) {
            tracing::debug!(task_id = %self.task_id, outcome = %state, "Watch already ended, outcome dropped");
            return;
        }

        metrics::counter!("watch_outcomes_total", "outcome" => state.to_string()).increment(1);
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match state {
            WatchState::Completed => {
                tracing::info!(task_id = %self.task_id, elapsed_ms, "Task completed")
            }
            _ => tracing::info!(
                task_id = %self.task_id,
                outcome = %state,
                error = outcome.error_message().unwrap_or_default(),
                elapsed_ms,
                "Task did not complete"
            ),
        }

        if let Some(on_outcome) = self.on_outcome.take() {
            on_outcome(outcome);
        }
    }
}
