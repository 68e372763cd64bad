//! Test doubles for the status store.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shorts_gen::models::job::JobStatus;
use shorts_gen::services::status_store::{JobStatusStore, StoreError, Subscription};
use shorts_gen::watcher::WatchOutcome;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// One scripted answer to `get_status`.
pub enum Read {
    Status(JobStatus),
    Fail,
}

/// A status store that records every interaction.
///
/// `get_status` answers from a script, then from `fallback` once the script
/// runs out. Subscriptions hand out a channel the test pushes into.
pub struct SpyStore {
    script: Mutex<VecDeque<Read>>,
    fallback: JobStatus,
    read_times: Mutex<Vec<Instant>>,
    subscribe_calls: AtomicUsize,
    failing_subscribes: AtomicUsize,
    releases: Arc<AtomicUsize>,
    push: Mutex<Option<mpsc::Sender<JobStatus>>>,
}

impl SpyStore {
    pub fn new(script: Vec<Read>, fallback: JobStatus) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            read_times: Mutex::new(Vec::new()),
            subscribe_calls: AtomicUsize::new(0),
            failing_subscribes: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            push: Mutex::new(None),
        })
    }

    /// Always pending.
    pub fn pending() -> Arc<Self> {
        Self::new(Vec::new(), JobStatus::Pending)
    }

    /// Make the next `n` subscribe calls fail.
    pub fn fail_subscribes(&self, n: usize) {
        self.failing_subscribes.store(n, Ordering::SeqCst);
    }

    /// Deliver a notification to the live subscription, if any.
    pub async fn push(&self, status: JobStatus) -> bool {
        let tx = self.push.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(status).await.is_ok(),
            None => false,
        }
    }

    pub fn reads(&self) -> usize {
        self.read_times.lock().unwrap().len()
    }

    pub fn read_times(&self) -> Vec<Instant> {
        self.read_times.lock().unwrap().clone()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStatusStore for SpyStore {
    async fn get_status(&self, _task_id: &str) -> Result<JobStatus, StoreError> {
        self.read_times.lock().unwrap().push(Instant::now());
        match self.script.lock().unwrap().pop_front() {
            Some(Read::Status(status)) => Ok(status),
            Some(Read::Fail) => Err(StoreError::Unavailable("connection reset".to_string())),
            None => Ok(self.fallback.clone()),
        }
    }

    async fn subscribe(&self, task_id: &str) -> Result<Subscription, StoreError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self.failing_subscribes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_subscribes.store(failing - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("listener refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(8);
        *self.push.lock().unwrap() = Some(tx);

        let releases = self.releases.clone();
        Ok(Subscription::new(task_id, rx).on_release(move || {
            releases.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Callback that forwards the outcome into a oneshot and counts calls.
pub fn capture() -> (
    impl FnOnce(WatchOutcome) + Send + 'static,
    oneshot::Receiver<WatchOutcome>,
    Arc<AtomicUsize>,
) {
    let (tx, rx) = oneshot::channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let callback = move |outcome: WatchOutcome| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(outcome);
    };
    (callback, rx, calls)
}

pub fn completed(url: &str) -> JobStatus {
    JobStatus::Completed {
        result_url: url.to_string(),
    }
}
