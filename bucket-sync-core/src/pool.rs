//! # pool: bounded producer/consumer transfer pool
//!
//! One producer enumerates work items into a bounded channel; `workers`
//! tasks drain it, each claiming one item at a time and running the
//! [`TransferHandler`] on it. A full channel blocks the producer, so
//! enumeration never runs far ahead of the transfers.
//!
//! ## Completion
//! Completion is two-phase: the [`TransferCounter`] only reports done once
//! the producer has finished enumerating *and* every enqueued item has
//! reached a terminal state. Counting alone is not enough, because the
//! counter can touch zero between two enqueues while the producer is still
//! walking.
//!
//! ## Failure policy
//! A failing item is logged and recorded in the [`TransferReport`]; it is
//! never retried and never stops the other workers.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::SyncError;

/// Outstanding-item counter plus an explicit "enumeration done" flag.
#[derive(Debug, Default)]
pub struct TransferCounter {
    outstanding: AtomicUsize,
    enumerated: AtomicBool,
    notify: Notify,
}

impl TransferCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        self.outstanding.fetch_add(n, Ordering::SeqCst);
    }

    /// Mark one item as finished. Never drops below zero.
    pub fn done(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if self.is_complete() {
            self.notify.notify_waiters();
        }
    }

    /// Signal that no further items will be added.
    pub fn close(&self) {
        self.enumerated.store(true, Ordering::SeqCst);
        if self.is_complete() {
            self.notify.notify_waiters();
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn is_complete(&self) -> bool {
        self.enumerated.load(Ordering::SeqCst) && self.outstanding() == 0
    }

    /// Resolve once enumeration is closed and nothing is outstanding.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }
}

/// Producer handle onto the bounded work queue.
pub struct WorkQueue<T> {
    tx: mpsc::Sender<T>,
    counter: Arc<TransferCounter>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            counter: self.counter.clone(),
        }
    }
}

impl<T> WorkQueue<T> {
    /// Enqueue an item, waiting while the queue is full.
    ///
    /// Returns `false` if every worker is gone and the item was dropped.
    pub async fn push(&self, item: T) -> bool {
        self.counter.add(1);
        if self.tx.send(item).await.is_err() {
            self.counter.done();
            return false;
        }
        true
    }

    /// Blocking variant of [`WorkQueue::push`] for producers running on a
    /// blocking thread. Must not be called from async context.
    pub fn blocking_push(&self, item: T) -> bool {
        self.counter.add(1);
        if self.tx.blocking_send(item).is_err() {
            self.counter.done();
            return false;
        }
        true
    }

    /// `true` once every worker has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferSuccess {
    pub source: String,
    pub destination: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferFailure {
    pub item: String,
    pub error: String,
}

/// Outcome of a whole run: every enqueued item lands in exactly one list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReport {
    pub succeeded: Vec<TransferSuccess>,
    pub failed: Vec<TransferFailure>,
}

impl TransferReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: TransferReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }
}

/// Per-item transfer logic plugged into the pool.
#[async_trait]
pub trait TransferHandler<T: Send + Sync>: Send + Sync {
    /// Human readable label used in logs and failure records.
    fn describe(&self, item: &T) -> String;

    async fn transfer(&self, item: &T) -> Result<TransferSuccess, SyncError>;
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub workers: usize,
    pub capacity: usize,
}

/// Decrements the counter when an item leaves the worker, panics included.
struct Completion<'a>(&'a TransferCounter);

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

/// Run `producer` against a fresh queue drained by `config.workers` workers.
///
/// Returns once enumeration is done and every enqueued item is terminal.
/// A producer error is returned after the items it did enqueue have drained.
pub async fn run_pool<T, H, P, Fut>(
    config: PoolConfig,
    handler: Arc<H>,
    producer: P,
) -> Result<TransferReport, SyncError>
where
    T: Send + Sync + 'static,
    H: TransferHandler<T> + 'static,
    P: FnOnce(WorkQueue<T>) -> Fut,
    Fut: Future<Output = Result<(), SyncError>>,
{
    let counter = Arc::new(TransferCounter::new());
    let (tx, rx) = mpsc::channel::<T>(config.capacity.max(1));
    let rx = Arc::new(Mutex::new(rx));

    let worker_count = config.workers.max(1);
    let mut workers = JoinSet::new();
    for id in 0..worker_count {
        workers.spawn(worker_loop(id, rx.clone(), handler.clone(), counter.clone()));
    }
    debug!(workers = worker_count, capacity = config.capacity, "Started transfer pool");

    let queue = WorkQueue {
        tx,
        counter: counter.clone(),
    };
    let produced = producer(queue).await;
    counter.close();
    counter.wait().await;

    let mut report = TransferReport::default();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(partial) => report.merge(partial),
            Err(e) => return Err(SyncError::Worker(e.to_string())),
        }
    }

    produced?;
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Transfer pool drained"
    );
    Ok(report)
}

async fn worker_loop<T, H>(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
    handler: Arc<H>,
    counter: Arc<TransferCounter>,
) -> TransferReport
where
    T: Send + Sync + 'static,
    H: TransferHandler<T> + 'static,
{
    let mut report = TransferReport::default();
    loop {
        let next = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(item) = next else {
            break;
        };

        let _completion = Completion(&counter);
        let label = handler.describe(&item);
        debug!(worker = id, item = %label, "Claimed item");
        match handler.transfer(&item).await {
            Ok(success) => report.succeeded.push(success),
            Err(err) => {
                error!(worker = id, item = %label, error = %err, "✗ transfer failed");
                report.failed.push(TransferFailure {
                    item: label,
                    error: err.to_string(),
                });
            }
        }
    }
    debug!(worker = id, "Worker finished");
    report
}
