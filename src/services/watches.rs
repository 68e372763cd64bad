//! Watches started on behalf of HTTP clients, keyed by task uuid.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::video::VideoTaskView;
use crate::watcher::{TaskCompletionWatcher, WatchError, WatchHandle, WatchOptions, WatchOutcome, WatchState};

/// How long an ended watch stays queryable.
const RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct Finished {
    outcome: WatchOutcome,
    at: Instant,
}

struct WatchEntry {
    handle: WatchHandle,
    finished: watch::Receiver<Option<Finished>>,
    cancelled_at: Option<Instant>,
}

impl WatchEntry {
    fn ended_at(&self) -> Option<Instant> {
        self.cancelled_at
            .or_else(|| self.finished.borrow().as_ref().map(|f| f.at))
    }
}

pub struct WatchRegistry {
    watcher: TaskCompletionWatcher,
    options: WatchOptions,
    entries: Mutex<HashMap<Uuid, WatchEntry>>,
}

impl WatchRegistry {
    pub fn new(watcher: TaskCompletionWatcher, options: WatchOptions) -> Self {
        Self {
            watcher,
            options,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> WatchOptions {
        self.options
    }

    /// Start watching `task_uuid`. A previous watch for the same uuid is
    /// cancelled and replaced.
    pub async fn start(&self, task_uuid: Uuid) -> Result<WatchState, WatchError> {
        let (tx, rx) = watch::channel(None);
        let handle = self
            .watcher
            .start_watch(&task_uuid.to_string(), self.options, move |outcome| {
                tx.send_replace(Some(Finished {
                    outcome,
                    at: Instant::now(),
                }));
            })?;
        let state = handle.state();

        let mut entries = self.entries.lock().await;
        prune(&mut entries, Instant::now());
        let replaced = entries.insert(
            task_uuid,
            WatchEntry {
                handle,
                finished: rx,
                cancelled_at: None,
            },
        );
        if let Some(previous) = replaced {
            tracing::warn!(task_uuid = %task_uuid, "Replacing existing watch");
            previous.handle.cancel();
        }
        metrics::gauge!("active_watches").set(count_active(&entries) as f64);

        Ok(state)
    }

    pub async fn view(&self, task_uuid: Uuid) -> Option<VideoTaskView> {
        let (state, active, mut finished) = {
            let entries = self.entries.lock().await;
            let entry = entries.get(&task_uuid)?;
            (entry.handle.state(), entry.handle.is_active(), entry.finished.clone())
        };

        // A delivered watch turns terminal just before its outcome is
        // published; wait for the outcome rather than report it as pending.
        let finished = match state {
            WatchState::Completed | WatchState::Failed | WatchState::TimedOut => finished
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|f| (*f).clone()),
            _ => finished.borrow().clone(),
        };

        let view = match finished {
            Some(f) => VideoTaskView {
                task_uuid,
                state: f.outcome.state(),
                active: false,
                status: f.outcome.status().to_string(),
                result_url: f.outcome.result_url().map(str::to_string),
                error_message: f.outcome.error_message().map(str::to_string),
            },
            None => VideoTaskView {
                task_uuid,
                state,
                active,
                status: if state == WatchState::Cancelled { "cancelled" } else { "pending" }.to_string(),
                result_url: None,
                error_message: None,
            },
        };
        Some(view)
    }

    /// Cancel the watch for `task_uuid`.
    ///
    /// `None` if the uuid is unknown, otherwise whether this call ended it.
    pub async fn cancel(&self, task_uuid: Uuid) -> Option<bool> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&task_uuid)?;
        let cancelled = entry.handle.cancel();
        if cancelled {
            entry.cancelled_at = Some(Instant::now());
        }
        metrics::gauge!("active_watches").set(count_active(&entries) as f64);
        Some(cancelled)
    }

    pub async fn active_count(&self) -> usize {
        count_active(&*self.entries.lock().await)
    }
}

fn count_active(entries: &HashMap<Uuid, WatchEntry>) -> usize {
    entries.values().filter(|e| e.handle.is_active()).count()
}

fn prune(entries: &mut HashMap<Uuid, WatchEntry>, now: Instant) {
    let before = entries.len();
    entries.retain(|_, entry| match entry.ended_at() {
        Some(at) => now.duration_since(at) < RETENTION,
        None => true,
    });
    let pruned = before - entries.len();
    if pruned > 0 {
        tracing::debug!(pruned, "Pruned ended watches");
    }
}
