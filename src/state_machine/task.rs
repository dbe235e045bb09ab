//! # Escalation Tasks
//!
//! `StateTaskManager` arms the delayed firing of an escalation event against a
//! unit on the shared [`TimerService`] and cancels it when a transition
//! supersedes it first.
//!
//! A firing that is consumed as a retry re-arms the same key with the same
//! delay, so an escalation with a ceiling of `R` fires `R + 1` times in total
//! when nothing supersedes it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};

use super::event::Escalation;
use super::handler::StateHandler;
use super::retry::{RetryManager, RetryStatus};
use super::unit::StateUnit;
use super::Trigger;
use crate::constants::ResultCode;
use crate::scheduler::{TimerId, TimerService};

/// One armed escalation
#[derive(Debug, Clone, Serialize)]
pub struct StateTask {
    pub key: String,
    pub unit: String,
    pub event: String,
    pub delay: Duration,
    pub armed_at: DateTime<Utc>,
    pub firings: u32,
    #[serde(skip)]
    timer_id: Option<TimerId>,
}

pub struct StateTaskManager {
    handler_name: String,
    timer: Arc<TimerService>,
    retries: RetryManager,
    tasks: DashMap<String, StateTask>,
}

impl StateTaskManager {
    pub fn new(handler_name: impl Into<String>, timer: Arc<TimerService>) -> Arc<Self> {
        Arc::new(Self {
            handler_name: handler_name.into(),
            timer,
            retries: RetryManager::new(),
            tasks: DashMap::new(),
        })
    }

    pub fn retry_manager(&self) -> &RetryManager {
        &self.retries
    }

    /// Arm `escalation` for `unit` under `key`
    pub(crate) fn arm(
        self: &Arc<Self>,
        handler: &Arc<StateHandler>,
        unit: &Arc<StateUnit>,
        key: String,
        escalation: &Escalation,
    ) {
        if escalation.retry_limit > 0 {
            self.retries.add_retry_unit(&key, escalation.retry_limit);
        }

        // Registered before the timer exists so a zero-delay firing finds its entry.
        self.tasks.insert(
            key.clone(),
            StateTask {
                key: key.clone(),
                unit: unit.name().to_string(),
                event: escalation.event.clone(),
                delay: escalation.delay,
                armed_at: Utc::now(),
                firings: 0,
                timer_id: None,
            },
        );

        let timer_id = self.schedule_firing(handler, unit, &key, &escalation.event, escalation.delay);
        if let Some(mut task) = self.tasks.get_mut(&key) {
            task.timer_id = Some(timer_id);
        }

        debug!(
            code = %ResultCode::SuccessAddStateTaskUnit,
            handler = %self.handler_name,
            unit = %unit.name(),
            key = %key,
            event = %escalation.event,
            delay_ms = escalation.delay.as_millis() as u64,
            retry_limit = escalation.retry_limit,
            "Escalation armed"
        );
    }

    fn schedule_firing(
        self: &Arc<Self>,
        handler: &Arc<StateHandler>,
        unit: &Arc<StateUnit>,
        key: &str,
        event: &str,
        delay: Duration,
    ) -> TimerId {
        let tasks: Weak<Self> = Arc::downgrade(self);
        let handler: Weak<StateHandler> = Arc::downgrade(handler);
        let unit = Arc::clone(unit);
        let key = key.to_string();
        let event = event.to_string();

        self.timer.schedule_once(delay, move || {
            let (Some(tasks), Some(handler)) = (tasks.upgrade(), handler.upgrade()) else {
                return;
            };
            tasks.on_fire(&handler, &unit, &key, &event, delay);
        })
    }

    fn on_fire(
        self: &Arc<Self>,
        handler: &Arc<StateHandler>,
        unit: &Arc<StateUnit>,
        key: &str,
        event: &str,
        delay: Duration,
    ) {
        if !self.tasks.contains_key(key) {
            debug!(handler = %self.handler_name, key = %key, "Escalation cancelled before firing");
            return;
        }

        handler.handle(
            event,
            unit,
            Trigger::Scheduled {
                escalation_key: key.to_string(),
            },
        );

        let retrying = unit.is_alive()
            && self.retries.retry_status(key) == RetryStatus::Ongoing
            && unit.next_event_key().as_deref() == Some(key);

        if retrying {
            let timer_id = self.schedule_firing(handler, unit, key, event, delay);
            match self.tasks.get_mut(key) {
                Some(mut task) => {
                    task.timer_id = Some(timer_id);
                    task.firings += 1;
                }
                None => {
                    // Cancelled while this firing ran
                    self.timer.cancel(timer_id);
                }
            }
        } else {
            self.tasks.remove(key);
            self.retries.remove_retry_unit(key);
        }
    }

    /// Cancel the escalation armed under `key`. Returns false if nothing was
    /// armed; cancelling twice is harmless.
    pub fn cancel(&self, key: &str) -> bool {
        let removed = self.tasks.remove(key);
        self.retries.remove_retry_unit(key);

        match removed {
            Some((_, task)) => {
                if let Some(timer_id) = task.timer_id {
                    self.timer.cancel(timer_id);
                }
                debug!(
                    code = %ResultCode::SuccessRemoveStateTaskUnit,
                    handler = %self.handler_name,
                    unit = %task.unit,
                    key = %key,
                    "Escalation cancelled"
                );
                true
            }
            None => false,
        }
    }

    pub fn task(&self, key: &str) -> Option<StateTask> {
        self.tasks.get(key).map(|task| task.clone())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.tasks.iter().map(|task| task.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Cancel every armed escalation
    pub fn stop(&self) {
        let keys = self.task_keys();
        for key in &keys {
            self.cancel(key);
        }
        self.retries.clear();
        info!(handler = %self.handler_name, cancelled = keys.len(), "🛑 STATE TASKS: Stopped");
    }
}

impl std::fmt::Debug for StateTaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTaskManager")
            .field("handler_name", &self.handler_name)
            .field("tasks", &self.tasks.len())
            .field("retry_units", &self.retries.len())
            .finish()
    }
}
