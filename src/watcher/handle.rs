use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::WatchMode;

/// Lifecycle of a single watch.
///
/// `Started` and `Observing` are transient. The other four are terminal and
/// mutually exclusive; nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WatchState {
    Started = 0,
    Observing = 1,
    Completed = 2,
    Failed = 3,
    TimedOut = 4,
    Cancelled = 5,
}

impl WatchState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WatchState::Started | WatchState::Observing)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => WatchState::Started,
            1 => WatchState::Observing,
            2 => WatchState::Completed,
            3 => WatchState::Failed,
            4 => WatchState::TimedOut,
            _ => WatchState::Cancelled,
        }
    }
}

/// State shared between a [`WatchHandle`] and the task driving its watch.
#[derive(Debug)]
pub(crate) struct WatchShared {
    state: AtomicU8,
}

impl WatchShared {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(WatchState::Started as u8),
        }
    }

    pub(crate) fn state(&self) -> WatchState {
        WatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Started -> Observing`. Fails if the watch already ended.
    pub(crate) fn begin_observing(&self) -> bool {
        self.state
            .compare_exchange(
                WatchState::Started as u8,
                WatchState::Observing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move into the terminal state `to`. Only the first caller wins; every
    /// later call returns `false` and changes nothing.
    pub(crate) fn finish(&self, to: WatchState) -> bool {
        debug_assert!(to.is_terminal());
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if WatchState::from_u8(current).is_terminal() {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Caller-owned handle to a running watch.
///
/// Dropping the handle while the watch is still active cancels it, so a
/// watch never outlives whoever started it.
#[derive(Debug)]
pub struct WatchHandle {
    task_id: String,
    mode: WatchMode,
    started_at: DateTime<Utc>,
    started: Instant,
    shared: Arc<WatchShared>,
    cancel: CancellationToken,
}

impl WatchHandle {
    pub(crate) fn new(
        task_id: String,
        mode: WatchMode,
        started: Instant,
        shared: Arc<WatchShared>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id,
            mode,
            started_at: Utc::now(),
            started,
            shared,
            cancel,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    /// Wall-clock time the watch was started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }

    pub fn state(&self) -> WatchState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        !self.shared.state().is_terminal()
    }

    /// Stop the watch without delivering an outcome.
    ///
    /// Returns `true` if this call ended the watch, `false` if it had already
    /// ended (delivered, timed out or cancelled before).
    pub fn cancel(&self) -> bool {
        if !self.shared.finish(WatchState::Cancelled) {
            return false;
        }
        metrics::counter!("watch_outcomes_total", "outcome" => WatchState::Cancelled.to_string())
            .increment(1);
        tracing::info!(task_id = %self.task_id, "Watch cancelled");
        self.cancel.cancel();
        true
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if self.is_active() {
            tracing::debug!(task_id = %self.task_id, "Watch handle dropped while active");
            self.cancel();
        }
    }
}
