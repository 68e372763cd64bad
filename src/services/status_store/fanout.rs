//! Routes status notifications from one shared listener to the
//! subscriptions interested in each task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::{Subscription, SUBSCRIPTION_BUFFER};
use crate::models::job::JobStatus;

type Routes = HashMap<String, HashMap<u64, mpsc::Sender<JobStatus>>>;

/// Subscribers keyed by task id, then by subscription id.
///
/// Each [`Subscription`] handed out by [`StatusFanout::register`] removes its
/// own route when dropped.
#[derive(Default)]
pub struct StatusFanout {
    routes: Mutex<Routes>,
    next_id: AtomicU64,
}

impl StatusFanout {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>, task_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.routes
            .lock()
            .entry(task_id.to_string())
            .or_default()
            .insert(id, tx);

        let fanout = Arc::clone(self);
        let key = task_id.to_string();
        Subscription::new(task_id, rx).on_release(move || fanout.remove(&key, id))
    }

    fn remove(&self, task_id: &str, id: u64) {
        let mut routes = self.routes.lock();
        if let Some(subscribers) = routes.get_mut(task_id) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                routes.remove(task_id);
            }
        }
    }

    /// Hand `status` to every subscriber of `task_id`. Returns how many
    /// subscribers accepted it.
    pub fn dispatch(&self, task_id: &str, status: &JobStatus) -> usize {
        let routes = self.routes.lock();
        let Some(subscribers) = routes.get(task_id) else {
            return 0;
        };

        let mut delivered = 0;
        for tx in subscribers.values() {
            match tx.try_send(status.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(task_id, "Status subscriber is full, notification dropped")
                }
                // Receiver gone; its release hook removes the route.
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Close every subscription. Subscribers see their channel end and
    /// subscribe again.
    pub fn close_all(&self) -> usize {
        let mut routes = self.routes.lock();
        let closed = routes.values().map(HashMap::len).sum();
        routes.clear();
        closed
    }

    /// Number of live subscriptions across all tasks.
    pub fn subscriber_count(&self) -> usize {
        self.routes.lock().values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed() -> JobStatus {
        JobStatus::Completed {
            result_url: "https://x/v.mp4".to_string(),
        }
    }

    #[tokio::test]
    async fn dispatch_reaches_only_matching_task() {
        let fanout = StatusFanout::new();
        let mut a1 = fanout.register("a");
        let mut a2 = fanout.register("a");
        let mut b = fanout.register("b");

        assert_eq!(fanout.dispatch("a", &completed()), 2);
        assert_eq!(a1.recv().await, Some(completed()));
        assert_eq!(a2.recv().await, Some(completed()));
        assert!(b.try_recv().is_none());

        assert_eq!(fanout.dispatch("nobody", &completed()), 0);
    }

    #[test]
    fn dropping_a_subscription_removes_its_route() {
        let fanout = StatusFanout::new();
        let first = fanout.register("a");
        let second = fanout.register("a");
        assert_eq!(fanout.subscriber_count(), 2);

        drop(first);
        assert_eq!(fanout.subscriber_count(), 1);
        assert_eq!(fanout.dispatch("a", &JobStatus::Pending), 1);

        drop(second);
        assert_eq!(fanout.subscriber_count(), 0);
        assert!(fanout.routes.lock().is_empty());
    }

    #[test]
    fn many_subscriptions_share_one_table() {
        let fanout = StatusFanout::new();
        let subs: Vec<_> = (0..50).map(|i| fanout.register(&format!("task-{i}"))).collect();
        assert_eq!(fanout.subscriber_count(), 50);
        assert_eq!(fanout.dispatch("task-7", &completed()), 1);

        drop(subs);
        assert_eq!(fanout.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn close_all_ends_every_subscription() {
        let fanout = StatusFanout::new();
        let mut sub = fanout.register("a");

        assert_eq!(fanout.close_all(), 1);
        assert_eq!(sub.recv().await, None);

        // Release after close is harmless.
        drop(sub);
        assert_eq!(fanout.subscriber_count(), 0);
    }
}
