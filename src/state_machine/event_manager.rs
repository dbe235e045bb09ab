//! # Event Manager
//!
//! Holds the declared events of one handler and owns `next_state`, the single
//! authority for state change. Explicit `fire` calls and escalation firings
//! both end up here.
//!
//! Only state mutation happens under the unit lock. Escalation bookkeeping and
//! every callback run after the lock is released.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::callback::{invoke, CallbackKind};
use super::errors::{StateMachineError, StateMachineResult};
use super::event::{Escalation, StateEvent};
use super::handler::StateHandler;
use super::retry::RetryStatus;
use super::unit::StateUnit;
use super::Trigger;
use crate::constants::ResultCode;
use crate::logging::log_state_transition;

/// What the critical section decided
enum Outcome {
    Transited {
        from: String,
        superseded: Option<String>,
        armed: Option<(String, Escalation)>,
        suppress_success: bool,
    },
    RetryConsumed,
    Mismatch,
}

pub struct StateEventManager {
    handler_name: String,
    events: RwLock<HashMap<String, Arc<StateEvent>>>,
}

impl StateEventManager {
    pub fn new(handler_name: impl Into<String>) -> Self {
        Self {
            handler_name: handler_name.into(),
            events: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_event(&self, event: StateEvent) -> StateMachineResult<()> {
        let mut events = self.events.write();
        if events.contains_key(event.name()) {
            let err = StateMachineError::DuplicateEvent {
                event: event.name().to_string(),
            };
            warn!(code = %err.result_code(), handler = %self.handler_name, error = %err, "Event rejected");
            return Err(err);
        }

        info!(
            code = %ResultCode::SuccessAddState,
            handler = %self.handler_name,
            event = %event,
            "Event registered"
        );
        events.insert(event.name().to_string(), Arc::new(event));
        Ok(())
    }

    pub fn remove_event(&self, name: &str) -> bool {
        let removed = self.events.write().remove(name).is_some();
        if removed {
            debug!(code = %ResultCode::SuccessRemoveState, handler = %self.handler_name, event = %name, "Event removed");
        }
        removed
    }

    pub fn event(&self, name: &str) -> Option<Arc<StateEvent>> {
        self.events.read().get(name).cloned()
    }

    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.events.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Attempt `event_name` on `unit`.
    ///
    /// Returns the unit's state at the end of the attempt, or `None` when the
    /// event is unknown, the unit is dead, or a scheduled firing is stale.
    pub(crate) fn next_state(
        &self,
        handler: &Arc<StateHandler>,
        event_name: &str,
        unit: &Arc<StateUnit>,
        trigger: Trigger,
    ) -> Option<String> {
        let Some(event) = self.event(event_name) else {
            warn!(
                code = %ResultCode::FailGetEvent,
                handler = %self.handler_name,
                unit = %unit.name(),
                event = %event_name,
                "Unknown event"
            );
            return None;
        };

        if !unit.is_alive() {
            warn!(
                code = %ResultCode::FailTransitState,
                handler = %self.handler_name,
                unit = %unit.name(),
                event = %event_name,
                "State unit is not alive"
            );
            return None;
        }

        let tasks = handler.task_manager();

        let (outcome, cur_state) = {
            let mut state = unit.lock();

            // Re-checked under the lock: removal may have raced the firing.
            if !unit.is_alive() {
                return None;
            }

            if let Trigger::Scheduled { escalation_key } = &trigger {
                if state.next_event_key.as_deref() != Some(escalation_key.as_str()) {
                    debug!(
                        handler = %self.handler_name,
                        unit = %unit.name(),
                        event = %event_name,
                        key = %escalation_key,
                        "Stale escalation firing ignored"
                    );
                    return None;
                }
            }

            let outcome = if !event.accepts(&state.cur_state) {
                Outcome::Mismatch
            } else {
                let retry = match &trigger {
                    Trigger::Scheduled { escalation_key } => {
                        tasks.retry_manager().check_retry(escalation_key)
                    }
                    Trigger::Explicit => RetryStatus::None,
                };

                if retry == RetryStatus::Ongoing {
                    Outcome::RetryConsumed
                } else {
                    let from = state.cur_state.clone();
                    state.transit(event.to_state());
                    let superseded = state.next_event_key.take();
                    let armed = event.escalation().map(|escalation| {
                        let key = unit.escalation_key(event.to_state());
                        state.next_event_key = Some(key.clone());
                        (key, escalation.clone())
                    });
                    Outcome::Transited {
                        from,
                        superseded,
                        armed,
                        suppress_success: retry == RetryStatus::Idle,
                    }
                }
            };
            (outcome, state.cur_state.clone())
        };

        match outcome {
            Outcome::Transited {
                from,
                superseded,
                armed,
                suppress_success,
            } => {
                if let Some(key) = superseded {
                    tasks.cancel(&key);
                }
                if let Some((key, escalation)) = armed {
                    tasks.arm(handler, unit, key, &escalation);
                }

                log_state_transition(
                    &self.handler_name,
                    unit.name(),
                    event.name(),
                    &from,
                    event.to_state(),
                    ResultCode::SuccessTransitState,
                );

                if !suppress_success {
                    if let Some(callback) = event.success_callback() {
                        let result = invoke(callback.as_ref(), CallbackKind::Success, event.name(), unit);
                        unit.store_success_result(result);
                    }
                }
            }
            Outcome::RetryConsumed => {
                debug!(
                    handler = %self.handler_name,
                    unit = %unit.name(),
                    event = %event_name,
                    state = %cur_state,
                    "Escalation firing consumed as retry"
                );
                if let Some(callback) = event.retry_callback() {
                    invoke(callback.as_ref(), CallbackKind::Retry, event.name(), unit);
                }
            }
            Outcome::Mismatch => {
                let expected: Vec<&str> = event.from_states().iter().map(String::as_str).collect();
                warn!(
                    code = %ResultCode::FailTransitState,
                    handler = %self.handler_name,
                    unit = %unit.name(),
                    event = %event_name,
                    cur_state = %cur_state,
                    expected = ?expected,
                    "From state is not matched"
                );
                if let Some(callback) = event.fail_callback() {
                    let result = invoke(callback.as_ref(), CallbackKind::Fail, event.name(), unit);
                    unit.store_fail_result(result);
                }
            }
        }

        Some(cur_state)
    }
}
