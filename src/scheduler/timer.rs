//! # Timer Service
//!
//! The single delayed-execution primitive shared by the job scheduler and the
//! state machine escalations. Every timer is a lightweight task on one small
//! tokio runtime, so the timer wheel of that runtime drives all one-shot and
//! fixed-rate work instead of a thread per timer.
//!
//! Cancellation is race-free against a timer that has not fired yet: each
//! timer owns a slot with a cancel flag and a `Notify` permit that is honoured
//! even when the cancel lands before the timer task is first polled. A one-shot
//! timer that already fired cannot be recalled; callers tolerate that single
//! late firing by re-checking their own state.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Notify;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::errors::{SchedulerError, SchedulerResult};

/// Identifier of one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Returned by fixed-rate bodies to keep or stop their timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerControl {
    Continue,
    Stop,
}

#[derive(Debug, Default)]
struct TimerSlot {
    cancelled: AtomicBool,
    notify: Notify,
}

impl TimerSlot {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

pub struct TimerService {
    name: String,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    slots: Arc<DashMap<TimerId, Arc<TimerSlot>>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl TimerService {
    /// Build a timer service that owns its runtime.
    ///
    /// `blocking_threads` bounds how many one-shot bodies may run at once.
    pub fn new(
        name: impl Into<String>,
        worker_threads: usize,
        blocking_threads: usize,
    ) -> SchedulerResult<Arc<Self>> {
        let name = name.into();
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .max_blocking_threads(blocking_threads.max(1))
            .thread_name(format!("{name}-timer"))
            .enable_time()
            .build()
            .map_err(|e| SchedulerError::Runtime(e.to_string()))?;

        info!(
            timer = %name,
            worker_threads = worker_threads.max(1),
            blocking_threads = blocking_threads.max(1),
            "⏱️ TIMER: Runtime started"
        );

        Ok(Arc::new(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            name,
            slots: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }))
    }

    /// Build a timer service on an existing runtime the caller keeps alive
    pub fn with_handle(name: impl Into<String>, handle: Handle) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            handle,
            runtime: Mutex::new(None),
            slots: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn register(&self) -> (TimerId, Arc<TimerSlot>) {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(TimerSlot::default());
        self.slots.insert(id, Arc::clone(&slot));
        (id, slot)
    }

    /// Run `task` once after `delay` on the runtime's blocking pool
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let (id, slot) = self.register();
        if self.is_shut_down() {
            warn!(timer = %self.name, %id, "Timer service is shut down; one-shot timer dropped");
            self.slots.remove(&id);
            return id;
        }

        let slots = Arc::clone(&self.slots);
        self.handle.spawn(async move {
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = slot.notify.notified() => {
                    slots.remove(&id);
                    return;
                }
            }
            slots.remove(&id);
            if slot.is_cancelled() {
                return;
            }
            // One-shot bodies may run arbitrary callbacks; keep them off the timer workers.
            drop(tokio::task::spawn_blocking(task));
        });

        debug!(timer = %self.name, %id, delay_ms = delay.as_millis() as u64, "One-shot timer armed");
        id
    }

    /// Run `task` after `initial_delay` and then every `period` until it
    /// returns `TimerControl::Stop` or the timer is cancelled.
    ///
    /// The body runs inline on a timer worker and must stay short.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        mut task: F,
    ) -> TimerId
    where
        F: FnMut() -> TimerControl + Send + 'static,
    {
        let (id, slot) = self.register();
        if self.is_shut_down() {
            warn!(timer = %self.name, %id, "Timer service is shut down; fixed-rate timer dropped");
            self.slots.remove(&id);
            return id;
        }

        let period = period.max(Duration::from_millis(1));
        let slots = Arc::clone(&self.slots);
        self.handle.spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = slot.notify.notified() => break,
                }
                if slot.is_cancelled() || task() == TimerControl::Stop {
                    break;
                }
            }
            slots.remove(&id);
        });

        debug!(
            timer = %self.name,
            %id,
            initial_delay_ms = initial_delay.as_millis() as u64,
            period_ms = period.as_millis() as u64,
            "Fixed-rate timer armed"
        );
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        match self.slots.remove(&id) {
            Some((_, slot)) => {
                slot.cancel();
                debug!(timer = %self.name, %id, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn active_timers(&self) -> usize {
        self.slots.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Cancel every timer and release the owned runtime, if any
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let pending: Vec<TimerId> = self.slots.iter().map(|entry| *entry.key()).collect();
        for id in pending {
            self.cancel(id);
        }

        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        info!(timer = %self.name, "⏱️ TIMER: Shut down");
    }
}

impl fmt::Debug for TimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerService")
            .field("name", &self.name)
            .field("active_timers", &self.slots.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn service() -> Arc<TimerService> {
        TimerService::new("test", 1, 2).unwrap()
    }

    #[test]
    fn test_one_shot_fires_once() {
        let timer = service();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let id = timer.schedule_once(Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_pending(id));

        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending(id));
    }

    #[test]
    fn test_cancelled_one_shot_never_fires() {
        let timer = service();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let id = timer.schedule_once(Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.cancel(id));
        assert!(!timer.cancel(id), "second cancel must be a no-op");

        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fixed_rate_stops_on_control() {
        let timer = service();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        timer.schedule_at_fixed_rate(Duration::ZERO, Duration::from_millis(10), move || {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                TimerControl::Stop
            } else {
                TimerControl::Continue
            }
        });

        thread::sleep(Duration::from_millis(200));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(timer.active_timers(), 0);
    }

    #[test]
    fn test_borrowed_runtime_is_left_running() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();
        let timer = TimerService::with_handle("borrowed", runtime.handle().clone());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        timer.schedule_once(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        timer.shutdown();
        let after = runtime.block_on(async { 7 });
        assert_eq!(after, 7);
    }

    #[test]
    fn test_shutdown_cancels_pending_timers() {
        let timer = service();
        timer.schedule_once(Duration::from_secs(10), || {});
        timer.schedule_at_fixed_rate(Duration::from_secs(10), Duration::from_secs(1), || {
            TimerControl::Continue
        });
        assert_eq!(timer.active_timers(), 2);

        timer.shutdown();
        assert_eq!(timer.active_timers(), 0);
        assert!(timer.is_shut_down());
    }
}
