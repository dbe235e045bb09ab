#![allow(dead_code)]

pub mod strategies;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dashflow_core::scheduler::{ScheduleManager, TimerService};
use dashflow_core::state_machine::StateManager;

pub fn timer(name: &str) -> Arc<TimerService> {
    dashflow_core::logging::init_structured_logging();
    TimerService::new(name, 1, 4).expect("timer service")
}

pub fn schedule_manager(name: &str) -> ScheduleManager {
    ScheduleManager::new(timer(name))
}

pub fn state_manager(name: &str) -> StateManager {
    StateManager::new(timer(name))
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Shared counter usable from job bodies and callbacks
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
