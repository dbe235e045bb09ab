//! # State Manager
//!
//! Entry point domain code uses to declare state machines, track units and
//! fire events. Handler, unit and condition maps each have their own coarse
//! lock, separate from the per-unit transition lock.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::condition::{condition_key, EventCondition, StateScheduler, UnitRegistry};
use super::errors::{StateMachineError, StateMachineResult};
use super::handler::StateHandler;
use super::unit::{StateUnit, UnitData};
use crate::constants::ResultCode;
use crate::scheduler::TimerService;

pub struct StateManager {
    timer: Arc<TimerService>,
    handlers: RwLock<HashMap<String, Arc<StateHandler>>>,
    units: UnitRegistry,
    conditions: RwLock<HashMap<String, StateScheduler>>,
}

impl StateManager {
    pub fn new(timer: Arc<TimerService>) -> Self {
        Self {
            timer,
            handlers: RwLock::new(HashMap::new()),
            units: Arc::new(RwLock::new(HashMap::new())),
            conditions: RwLock::new(HashMap::new()),
        }
    }

    /// Create the handler `name`, or return the existing one
    pub fn add_state_handler(&self, name: &str) -> Arc<StateHandler> {
        let mut handlers = self.handlers.write();
        if let Some(existing) = handlers.get(name) {
            return Arc::clone(existing);
        }
        let handler = StateHandler::new(name, Arc::clone(&self.timer));
        handlers.insert(name.to_string(), Arc::clone(&handler));
        info!(handler = %name, "🧭 STATE MANAGER: Handler added");
        handler
    }

    /// Remove a handler, cancelling its escalations and event conditions
    pub fn remove_state_handler(&self, name: &str) -> bool {
        let Some(handler) = self.handlers.write().remove(name) else {
            return false;
        };

        let stale: Vec<StateScheduler> = {
            let mut conditions = self.conditions.write();
            let keys: Vec<String> = conditions
                .values()
                .filter(|scheduler| scheduler.handler_name() == name)
                .map(|scheduler| scheduler.key().to_string())
                .collect();
            keys.iter().filter_map(|key| conditions.remove(key)).collect()
        };
        for scheduler in &stale {
            scheduler.stop(&self.timer);
        }

        handler.stop();
        true
    }

    pub fn get_state_handler(&self, name: &str) -> Option<Arc<StateHandler>> {
        self.handlers.read().get(name).cloned()
    }

    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Events declared across every handler
    pub fn total_event_count(&self) -> usize {
        self.handlers
            .read()
            .values()
            .map(|handler| handler.event_count())
            .sum()
    }

    /// Track a new unit of handler `handler_name` starting in `initial_state`
    pub fn add_state_unit(
        &self,
        name: &str,
        handler_name: &str,
        initial_state: &str,
        data: Option<UnitData>,
    ) -> StateMachineResult<Arc<StateUnit>> {
        if self.get_state_handler(handler_name).is_none() {
            let err = StateMachineError::HandlerNotFound {
                handler: handler_name.to_string(),
            };
            warn!(code = %err.result_code(), unit = %name, error = %err, "State unit rejected");
            return Err(err);
        }

        let mut units = self.units.write();
        if units.contains_key(name) {
            let err = StateMachineError::DuplicateUnit {
                unit: name.to_string(),
            };
            warn!(code = %err.result_code(), handler = %handler_name, error = %err, "State unit rejected");
            return Err(err);
        }

        let unit = Arc::new(StateUnit::new(name, handler_name, initial_state, data));
        units.insert(name.to_string(), Arc::clone(&unit));
        debug!(
            code = %ResultCode::SuccessAddState,
            handler = %handler_name,
            unit = %name,
            state = %initial_state,
            "State unit added"
        );
        Ok(unit)
    }

    /// Stop tracking `name`. The unit turns dead, so in-flight and later
    /// transition attempts on it are no-ops, and its escalation is cancelled.
    pub fn remove_state_unit(&self, name: &str) -> StateMachineResult<()> {
        let unit = self
            .units
            .write()
            .remove(name)
            .ok_or_else(|| StateMachineError::UnitNotFound {
                unit: name.to_string(),
            })?;

        unit.kill();
        if let Some(handler) = self.get_state_handler(unit.handler_name()) {
            handler.cancel_escalation(&unit);
        }
        debug!(
            code = %ResultCode::SuccessRemoveState,
            handler = %unit.handler_name(),
            unit = %name,
            "State unit removed"
        );
        Ok(())
    }

    pub fn get_state_unit(&self, name: &str) -> Option<Arc<StateUnit>> {
        self.units.read().get(name).cloned()
    }

    pub fn state_units(&self) -> Vec<Arc<StateUnit>> {
        let mut units: Vec<Arc<StateUnit>> = self.units.read().values().cloned().collect();
        units.sort_by(|a, b| a.name().cmp(b.name()));
        units
    }

    pub fn state_unit_count(&self) -> usize {
        self.units.read().len()
    }

    /// Fire `event` on `unit` through the unit's own handler
    pub fn fire(&self, event: &str, unit: &Arc<StateUnit>) -> Option<String> {
        let Some(handler) = self.get_state_handler(unit.handler_name()) else {
            warn!(
                code = %ResultCode::FailGetStateHandler,
                handler = %unit.handler_name(),
                unit = %unit.name(),
                event = %event,
                "State handler not found"
            );
            return None;
        };
        handler.fire(event, unit)
    }

    /// Fire `event` on the unit registered as `unit_name`
    pub fn fire_by_name(&self, event: &str, unit_name: &str) -> Option<String> {
        let Some(unit) = self.get_state_unit(unit_name) else {
            warn!(
                code = %ResultCode::NullObject,
                unit = %unit_name,
                event = %event,
                "State unit not found"
            );
            return None;
        };
        self.fire(event, &unit)
    }

    /// Every `interval`, fire `event` on each alive unit of `handler_name`
    /// that the event accepts and for which `condition` holds
    pub fn add_event_condition<C>(
        &self,
        handler_name: &str,
        event: &str,
        interval: Duration,
        condition: C,
    ) -> StateMachineResult<()>
    where
        C: EventCondition + 'static,
    {
        let handler = self
            .get_state_handler(handler_name)
            .ok_or_else(|| StateMachineError::HandlerNotFound {
                handler: handler_name.to_string(),
            })?;
        if handler.event(event).is_none() {
            return Err(StateMachineError::EventNotFound {
                event: event.to_string(),
            });
        }
        if interval.is_zero() {
            return Err(StateMachineError::invalid_event(
                event,
                "condition interval must be positive",
            ));
        }

        let key = condition_key(handler_name, event);
        let mut conditions = self.conditions.write();
        if conditions.contains_key(&key) {
            return Err(StateMachineError::DuplicateCondition {
                handler: handler_name.to_string(),
                event: event.to_string(),
            });
        }

        let scheduler = StateScheduler::start(
            &self.timer,
            &handler,
            &self.units,
            event,
            interval,
            Arc::new(condition),
        );
        conditions.insert(key, scheduler);
        info!(
            handler = %handler_name,
            event = %event,
            interval_ms = interval.as_millis() as u64,
            "Event condition registered"
        );
        Ok(())
    }

    pub fn remove_event_condition(&self, handler_name: &str, event: &str) -> bool {
        let removed = self
            .conditions
            .write()
            .remove(&condition_key(handler_name, event));
        match removed {
            Some(scheduler) => {
                scheduler.stop(&self.timer);
                true
            }
            None => false,
        }
    }

    /// Number of events fired so far by the condition on `handler_name`/`event`
    pub fn event_condition_fired_count(&self, handler_name: &str, event: &str) -> Option<u64> {
        self.conditions
            .read()
            .get(&condition_key(handler_name, event))
            .map(|scheduler| scheduler.fired_count())
    }

    /// Stop every condition and escalation and forget all handlers and units
    pub fn stop(&self) {
        let conditions: Vec<StateScheduler> = self.conditions.write().drain().map(|(_, s)| s).collect();
        for scheduler in &conditions {
            scheduler.stop(&self.timer);
        }

        let units: Vec<Arc<StateUnit>> = self.units.write().drain().map(|(_, u)| u).collect();
        for unit in &units {
            unit.kill();
        }

        let handlers: Vec<Arc<StateHandler>> = self.handlers.write().drain().map(|(_, h)| h).collect();
        for handler in &handlers {
            handler.stop();
        }

        info!(
            handlers = handlers.len(),
            units = units.len(),
            conditions = conditions.len(),
            "🛑 STATE MANAGER: Stopped"
        );
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("handlers", &self.handler_names())
            .field("units", &self.state_unit_count())
            .field("conditions", &self.conditions.read().len())
            .finish()
    }
}
