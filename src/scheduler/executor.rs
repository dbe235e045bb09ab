//! # Job Executor
//!
//! One worker thread per executor. Every tick the worker polls its bounded
//! priority queue for at most one job and runs it synchronously, so all work
//! assigned to one executor is serialized.
//!
//! Ordering is governed by priority, not by insertion: the lowest priority
//! value is dequeued first, and only jobs of equal priority keep FIFO order.

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::errors::{SchedulerError, SchedulerResult};
use super::job::Job;

/// Queue entry; `BinaryHeap` is a max-heap so the comparison is inverted
struct QueuedJob {
    job: Arc<Job>,
    priority: i32,
    sequence: u64,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Point-in-time counters for one executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorStats {
    pub index: usize,
    pub queued: usize,
    pub executed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub running: bool,
}

pub struct JobExecutor {
    domain: String,
    index: usize,
    capacity: usize,
    tick: Duration,
    queue: Mutex<BinaryHeap<QueuedJob>>,
    sequence: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    running: AtomicBool,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobExecutor {
    pub fn new(domain: impl Into<String>, index: usize, capacity: usize, tick: Duration) -> Self {
        Self {
            domain: domain.into(),
            index,
            capacity: capacity.max(1),
            tick: tick.max(Duration::from_micros(100)),
            queue: Mutex::new(BinaryHeap::with_capacity(capacity.max(1))),
            sequence: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            running: AtomicBool::new(false),
            shutdown_tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            index: self.index,
            queued: self.queue_len(),
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            running: self.is_running(),
        }
    }

    /// Spawn the worker thread. Starting a running executor is a no-op.
    pub fn start(self: &Arc<Self>) -> SchedulerResult<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let weak: Weak<Self> = Arc::downgrade(self);
        let tick = self.tick;

        let handle = thread::Builder::new()
            .name(format!("{}-executor-{}", self.domain, self.index))
            .spawn(move || {
                let ticker = channel::tick(tick);
                loop {
                    channel::select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            let Some(executor) = weak.upgrade() else { break };
                            executor.run_next();
                        }
                    }
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                SchedulerError::Runtime(format!(
                    "failed to spawn executor #{} of domain {}: {e}",
                    self.index, self.domain
                ))
            })?;

        *self.shutdown_tx.lock() = Some(shutdown_tx);
        *self.worker.lock() = Some(handle);
        debug!(domain = %self.domain, index = self.index, "Executor started");
        Ok(())
    }

    /// Add a job to the queue without blocking
    pub fn enqueue(&self, job: Arc<Job>) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::Runtime(format!(
                "executor #{} of domain {} is stopped",
                self.index, self.domain
            )));
        }

        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            return Err(SchedulerError::QueueFull {
                domain: self.domain.clone(),
                index: self.index,
                job: job.name().to_string(),
            });
        }
        queue.push(QueuedJob {
            priority: job.priority(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            job,
        });
        Ok(())
    }

    /// Pop and run at most one job. Returns false when the queue was empty.
    pub fn run_next(&self) -> bool {
        let next = self.queue.lock().pop();
        let Some(QueuedJob { job, .. }) = next else {
            return false;
        };

        if job.is_cancelled() {
            job.complete_run();
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(domain = %self.domain, index = self.index, job = %job.name(), "Skipping cancelled job");
            return true;
        }

        let started = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
            Ok(Ok(())) => {
                self.executed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    domain = %self.domain,
                    index = self.index,
                    job = %job.name(),
                    error = %e,
                    "Job body returned an error"
                );
            }
            Err(payload) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    domain = %self.domain,
                    index = self.index,
                    job = %job.name(),
                    panic = %panic_message(payload.as_ref()),
                    "Job body panicked"
                );
            }
        }

        if job.complete_run() {
            debug!(
                domain = %self.domain,
                job = %job.name(),
                "Job used its last run and is finished"
            );
        }
        debug!(
            domain = %self.domain,
            index = self.index,
            job = %job.name(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Job executed"
        );
        true
    }

    /// Stop the worker and drain the queue. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        drop(self.shutdown_tx.lock().take());

        let drained: Vec<QueuedJob> = self.queue.lock().drain().collect();
        for queued in &drained {
            queued.job.release_run();
        }

        if let Some(handle) = self.worker.lock().take() {
            // A job body that stops its own domain must not join itself.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!(domain = %self.domain, index = self.index, "Executor thread panicked during shutdown");
            }
        }

        info!(
            domain = %self.domain,
            index = self.index,
            drained = drained.len(),
            executed = self.executed.load(Ordering::Relaxed),
            "🛑 EXECUTOR: Stopped"
        );
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) {
            drop(self.shutdown_tx.lock().take());
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
