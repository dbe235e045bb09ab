//! # Event Conditions
//!
//! A condition-driven periodic trigger. For one handler and one declared
//! event, a `StateScheduler` wakes every `interval`, scans the alive units of
//! that handler whose current state the event accepts, and fires the event
//! (explicit path) for each unit whose predicate holds.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error};

use super::handler::StateHandler;
use super::unit::StateUnit;
use crate::scheduler::executor::panic_message;
use crate::scheduler::{TimerControl, TimerId, TimerService};

pub trait EventCondition: Send + Sync {
    fn check(&self, unit: &StateUnit) -> bool;
}

impl<F> EventCondition for F
where
    F: Fn(&StateUnit) -> bool + Send + Sync,
{
    fn check(&self, unit: &StateUnit) -> bool {
        self(unit)
    }
}

pub(crate) type UnitRegistry = Arc<RwLock<HashMap<String, Arc<StateUnit>>>>;

/// Key under which a condition is registered
pub fn condition_key(handler: &str, event: &str) -> String {
    format!("{handler}_{event}")
}

struct ConditionScan {
    handler: Weak<StateHandler>,
    units: Weak<RwLock<HashMap<String, Arc<StateUnit>>>>,
    event: String,
    condition: Arc<dyn EventCondition>,
    scanning: AtomicBool,
    fired: AtomicU64,
}

impl ConditionScan {
    fn scan(&self) {
        let (Some(handler), Some(units)) = (self.handler.upgrade(), self.units.upgrade()) else {
            return;
        };
        let Some(event) = handler.event(&self.event) else {
            debug!(handler = %handler.name(), event = %self.event, "Condition event is not declared");
            return;
        };

        let candidates: Vec<Arc<StateUnit>> = units
            .read()
            .values()
            .filter(|unit| unit.is_alive() && unit.handler_name() == handler.name())
            .cloned()
            .collect();

        for unit in candidates {
            if !event.accepts(&unit.cur_state()) {
                continue;
            }
            let holds = panic::catch_unwind(AssertUnwindSafe(|| self.condition.check(&unit)))
                .unwrap_or_else(|payload| {
                    error!(
                        handler = %handler.name(),
                        unit = %unit.name(),
                        event = %self.event,
                        panic = %panic_message(payload.as_ref()),
                        "Event condition panicked"
                    );
                    false
                });
            if holds {
                handler.fire(&self.event, &unit);
                self.fired.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// A registered event condition and its periodic timer
pub struct StateScheduler {
    key: String,
    handler_name: String,
    event: String,
    interval: Duration,
    timer_id: TimerId,
    scan: Arc<ConditionScan>,
}

impl StateScheduler {
    pub(crate) fn start(
        timer: &TimerService,
        handler: &Arc<StateHandler>,
        units: &UnitRegistry,
        event: &str,
        interval: Duration,
        condition: Arc<dyn EventCondition>,
    ) -> Self {
        let scan = Arc::new(ConditionScan {
            handler: Arc::downgrade(handler),
            units: Arc::downgrade(units),
            event: event.to_string(),
            condition,
            scanning: AtomicBool::new(false),
            fired: AtomicU64::new(0),
        });

        let ticking = Arc::clone(&scan);
        let timer_id = timer.schedule_at_fixed_rate(interval, interval, move || {
            if ticking.handler.strong_count() == 0 {
                return TimerControl::Stop;
            }
            // Skip this tick while the previous scan is still firing events.
            if ticking.scanning.swap(true, Ordering::AcqRel) {
                return TimerControl::Continue;
            }
            let scan = Arc::clone(&ticking);
            drop(tokio::task::spawn_blocking(move || {
                scan.scan();
                scan.scanning.store(false, Ordering::Release);
            }));
            TimerControl::Continue
        });

        Self {
            key: condition_key(handler.name(), event),
            handler_name: handler.name().to_string(),
            event: event.to_string(),
            interval,
            timer_id,
            scan,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Events fired by this condition so far
    pub fn fired_count(&self) -> u64 {
        self.scan.fired.load(Ordering::Relaxed)
    }

    pub(crate) fn stop(&self, timer: &TimerService) {
        timer.cancel(self.timer_id);
    }
}

impl std::fmt::Debug for StateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateScheduler")
            .field("key", &self.key)
            .field("event", &self.event)
            .field("interval", &self.interval)
            .field("fired", &self.fired_count())
            .finish()
    }
}
