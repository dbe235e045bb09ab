use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::callback::{SharedCallback, StateCallback};
use super::errors::{StateMachineError, StateMachineResult};
use super::unit::StateUnit;

/// Fallback armed after a transition: unless a matching transition happens
/// first, `event` fires after `delay`, retried up to `retry_limit` times
/// before it is allowed to take effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Escalation {
    pub event: String,
    pub delay: Duration,
    pub retry_limit: u32,
}

/// A declared transition rule: any of `from_states` → `to_state`
pub struct StateEvent {
    name: String,
    from_states: BTreeSet<String>,
    to_state: String,
    success_callback: Option<SharedCallback>,
    fail_callback: Option<SharedCallback>,
    retry_callback: Option<SharedCallback>,
    escalation: Option<Escalation>,
}

impl StateEvent {
    pub fn builder(name: impl Into<String>) -> StateEventBuilder {
        StateEventBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn from_states(&self) -> &BTreeSet<String> {
        &self.from_states
    }

    pub fn accepts(&self, state: &str) -> bool {
        self.from_states.contains(state)
    }

    pub fn to_state(&self) -> &str {
        &self.to_state
    }

    pub fn escalation(&self) -> Option<&Escalation> {
        self.escalation.as_ref()
    }

    pub(crate) fn success_callback(&self) -> Option<&SharedCallback> {
        self.success_callback.as_ref()
    }

    pub(crate) fn fail_callback(&self) -> Option<&SharedCallback> {
        self.fail_callback.as_ref()
    }

    pub(crate) fn retry_callback(&self) -> Option<&SharedCallback> {
        self.retry_callback.as_ref()
    }
}

impl fmt::Debug for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEvent")
            .field("name", &self.name)
            .field("from_states", &self.from_states)
            .field("to_state", &self.to_state)
            .field("has_success_callback", &self.success_callback.is_some())
            .field("has_fail_callback", &self.fail_callback.is_some())
            .field("has_retry_callback", &self.retry_callback.is_some())
            .field("escalation", &self.escalation)
            .finish()
    }
}

impl fmt::Display for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from: Vec<&str> = self.from_states.iter().map(String::as_str).collect();
        write!(f, "{}: {{{}}} -> {}", self.name, from.join(", "), self.to_state)?;
        if let Some(escalation) = &self.escalation {
            write!(
                f,
                " (then {} after {}ms, {} retries)",
                escalation.event,
                escalation.delay.as_millis(),
                escalation.retry_limit
            )?;
        }
        Ok(())
    }
}

pub struct StateEventBuilder {
    name: String,
    from_states: BTreeSet<String>,
    to_state: Option<String>,
    success_callback: Option<SharedCallback>,
    fail_callback: Option<SharedCallback>,
    retry_callback: Option<SharedCallback>,
    escalation: Option<Escalation>,
}

impl StateEventBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from_states: BTreeSet::new(),
            to_state: None,
            success_callback: None,
            fail_callback: None,
            retry_callback: None,
            escalation: None,
        }
    }

    pub fn from_state(mut self, state: impl Into<String>) -> Self {
        self.from_states.insert(state.into());
        self
    }

    pub fn from_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.from_states.extend(states.into_iter().map(Into::into));
        self
    }

    pub fn to_state(mut self, state: impl Into<String>) -> Self {
        self.to_state = Some(state.into());
        self
    }

    /// Runs after a transition takes effect
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&StateUnit) -> Option<Value> + Send + Sync + 'static,
    {
        self.success_callback = Some(Arc::new(callback));
        self
    }

    /// Runs when the unit is not in any of the from-states
    pub fn on_fail<F>(mut self, callback: F) -> Self
    where
        F: Fn(&StateUnit) -> Option<Value> + Send + Sync + 'static,
    {
        self.fail_callback = Some(Arc::new(callback));
        self
    }

    /// Runs on each scheduled firing that is consumed as a retry
    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&StateUnit) -> Option<Value> + Send + Sync + 'static,
    {
        self.retry_callback = Some(Arc::new(callback));
        self
    }

    /// Install a callback object for the success slot
    pub fn success_callback(mut self, callback: Arc<dyn StateCallback>) -> Self {
        self.success_callback = Some(callback);
        self
    }

    /// Install a callback object for the fail slot
    pub fn fail_callback(mut self, callback: Arc<dyn StateCallback>) -> Self {
        self.fail_callback = Some(callback);
        self
    }

    /// Install a callback object for the retry slot
    pub fn retry_callback(mut self, callback: Arc<dyn StateCallback>) -> Self {
        self.retry_callback = Some(callback);
        self
    }

    /// After this transition, fire `event` unless superseded within `delay`.
    /// The firing is retried `retry_limit` times before it takes effect.
    pub fn escalate_to(mut self, event: impl Into<String>, delay: Duration, retry_limit: u32) -> Self {
        self.escalation = Some(Escalation {
            event: event.into(),
            delay,
            retry_limit,
        });
        self
    }

    pub fn build(self) -> StateMachineResult<StateEvent> {
        if self.name.trim().is_empty() {
            return Err(StateMachineError::invalid_event(&self.name, "event name must not be empty"));
        }
        if self.from_states.is_empty() {
            return Err(StateMachineError::EmptyFromStates { event: self.name });
        }
        let to_state = match self.to_state {
            Some(state) if !state.trim().is_empty() => state,
            _ => {
                return Err(StateMachineError::invalid_event(
                    &self.name,
                    "a to-state is required",
                ))
            }
        };
        if self.from_states.contains(&to_state) {
            return Err(StateMachineError::ToStateInFromStates {
                event: self.name,
                state: to_state,
            });
        }
        if let Some(escalation) = &self.escalation {
            if escalation.event.trim().is_empty() {
                return Err(StateMachineError::invalid_event(
                    &self.name,
                    "escalation event name must not be empty",
                ));
            }
        }

        Ok(StateEvent {
            name: self.name,
            from_states: self.from_states,
            to_state,
            success_callback: self.success_callback,
            fail_callback: self.fail_callback,
            retry_callback: self.retry_callback,
            escalation: self.escalation,
        })
    }
}
