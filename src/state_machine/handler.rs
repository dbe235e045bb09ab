use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use super::errors::StateMachineResult;
use super::event::StateEvent;
use super::event_manager::StateEventManager;
use super::task::StateTaskManager;
use super::unit::StateUnit;
use super::Trigger;
use crate::scheduler::TimerService;

/// One state machine domain: its declared events and armed escalations
pub struct StateHandler {
    name: String,
    events: StateEventManager,
    tasks: Arc<StateTaskManager>,
    created_at: DateTime<Utc>,
}

impl StateHandler {
    pub fn new(name: impl Into<String>, timer: Arc<TimerService>) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            events: StateEventManager::new(name.clone()),
            tasks: StateTaskManager::new(name.clone(), timer),
            name,
            created_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Declare a transition. Duplicate event names are rejected.
    pub fn add_state(&self, event: StateEvent) -> StateMachineResult<()> {
        self.events.add_event(event)
    }

    pub fn remove_state(&self, event: &str) -> bool {
        self.events.remove_event(event)
    }

    pub fn event(&self, name: &str) -> Option<Arc<StateEvent>> {
        self.events.event(name)
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.event_names()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Drop every declared event and armed escalation
    pub fn clear(&self) {
        self.events.clear();
        self.tasks.stop();
    }

    pub fn task_manager(&self) -> &Arc<StateTaskManager> {
        &self.tasks
    }

    /// Explicit transition attempt; see [`StateEventManager`] for the rules
    pub fn fire(self: &Arc<Self>, event: &str, unit: &Arc<StateUnit>) -> Option<String> {
        self.handle(event, unit, Trigger::Explicit)
    }

    pub(crate) fn handle(
        self: &Arc<Self>,
        event: &str,
        unit: &Arc<StateUnit>,
        trigger: Trigger,
    ) -> Option<String> {
        self.events.next_state(self, event, unit, trigger)
    }

    /// Cancel whatever escalation is armed for `unit`
    pub fn cancel_escalation(&self, unit: &StateUnit) -> bool {
        let key = unit.lock().next_event_key.take();
        match key {
            Some(key) => self.tasks.cancel(&key),
            None => false,
        }
    }

    pub(crate) fn stop(&self) {
        self.tasks.stop();
        info!(handler = %self.name, events = self.event_count(), "🛑 STATE HANDLER: Stopped");
    }
}

impl std::fmt::Debug for StateHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandler")
            .field("name", &self.name)
            .field("events", &self.events.event_names())
            .field("tasks", &self.tasks)
            .finish()
    }
}
