//! # DASH Client State Machine
//!
//! Declares the client session state machine on a [`StateManager`]:
//!
//! ```text
//! IDLE --GET_MPD_{AUDIO,VIDEO}--> MPD_DONE --GET_{AUDIO,VIDEO}_INIT_SEG--> {AUDIO,VIDEO}_INIT_SEG_DONE
//!      --GET_{AUDIO,VIDEO}_MEDIA_SEG--> {AUDIO,VIDEO}_MEDIA_SEG_DONE --IDLE--> IDLE
//! ```
//!
//! With a media segment timeout configured, entering an init-segment state
//! arms a `MEDIA_SEG_TIMEOUT` escalation: each expiry first runs the retry
//! hook (resend the segment request), and once the retries are used up the
//! session falls back to IDLE.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::events::DashClientEvent;
use super::states::DashClientState;
use crate::state_machine::{
    SharedCallback, StateEvent, StateHandler, StateMachineResult, StateManager, StateUnit,
};

/// Handler name the client state machine is registered under
pub const DASH_CLIENT_HANDLER: &str = "DashClientState";

#[derive(Default)]
pub struct DashClientFsmOptions {
    media_segment_timeout: Option<(Duration, u32)>,
    success_callbacks: HashMap<DashClientEvent, SharedCallback>,
    fail_callbacks: HashMap<DashClientEvent, SharedCallback>,
    retry_callback: Option<SharedCallback>,
}

impl DashClientFsmOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fall back to IDLE when a media segment is not received within
    /// `timeout`, after `retries` retry firings
    pub fn media_segment_timeout(mut self, timeout: Duration, retries: u32) -> Self {
        self.media_segment_timeout = Some((timeout, retries));
        self
    }

    pub fn on_success<F>(mut self, event: DashClientEvent, callback: F) -> Self
    where
        F: Fn(&StateUnit) -> Option<Value> + Send + Sync + 'static,
    {
        self.success_callbacks.insert(event, Arc::new(callback));
        self
    }

    pub fn on_fail<F>(mut self, event: DashClientEvent, callback: F) -> Self
    where
        F: Fn(&StateUnit) -> Option<Value> + Send + Sync + 'static,
    {
        self.fail_callbacks.insert(event, Arc::new(callback));
        self
    }

    /// Runs on each media segment timeout that is consumed as a retry
    pub fn on_media_segment_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&StateUnit) -> Option<Value> + Send + Sync + 'static,
    {
        self.retry_callback = Some(Arc::new(callback));
        self
    }
}

/// Declare the DASH client state machine and return its handler
pub fn register_dash_client_fsm(
    manager: &StateManager,
    mut options: DashClientFsmOptions,
) -> StateMachineResult<Arc<StateHandler>> {
    let handler = manager.add_state_handler(DASH_CLIENT_HANDLER);

    for event in DashClientEvent::ALL {
        if event == DashClientEvent::MediaSegTimeout && options.media_segment_timeout.is_none() {
            continue;
        }

        let mut builder = StateEvent::builder(event.as_str())
            .from_states(event.from_states().iter().map(DashClientState::as_str))
            .to_state(event.to_state().as_str());

        if let Some(callback) = options.success_callbacks.remove(&event) {
            builder = builder.success_callback(callback);
        }
        if let Some(callback) = options.fail_callbacks.remove(&event) {
            builder = builder.fail_callback(callback);
        }
        if event == DashClientEvent::MediaSegTimeout {
            if let Some(callback) = options.retry_callback.clone() {
                builder = builder.retry_callback(callback);
            }
        }
        if let Some((timeout, retries)) = options.media_segment_timeout {
            if event.awaits_media_segment() {
                builder = builder.escalate_to(DashClientEvent::MediaSegTimeout.as_str(), timeout, retries);
            }
        }

        handler.add_state(builder.build()?)?;
    }

    info!(
        handler = %DASH_CLIENT_HANDLER,
        events = handler.event_count(),
        media_segment_timeout_ms = options.media_segment_timeout.map(|(t, _)| t.as_millis() as u64),
        "🎬 DASH CLIENT FSM: Registered"
    );
    Ok(handler)
}
