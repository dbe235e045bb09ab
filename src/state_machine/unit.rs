//! # State Units
//!
//! A `StateUnit` is one tracked instance of a state machine, for example one
//! segment-download sequence of one content track. Its mutable state lives
//! behind a single mutex, which doubles as the per-unit transition lock:
//! concurrent explicit and scheduled attempts on the same unit are totally
//! ordered by that lock, while different units transition in parallel.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::constants::state_machine::ESCALATION_KEY_SEPARATOR;

/// Opaque caller context attached to a unit; the engine never inspects it
pub type UnitData = Arc<dyn Any + Send + Sync>;

#[derive(Debug)]
pub(crate) struct UnitState {
    pub(crate) cur_state: String,
    pub(crate) prev_state: Option<String>,
    pub(crate) next_event_key: Option<String>,
    pub(crate) success_result: Option<Value>,
    pub(crate) fail_result: Option<Value>,
}

impl UnitState {
    pub(crate) fn transit(&mut self, to_state: &str) {
        let from = std::mem::replace(&mut self.cur_state, to_state.to_string());
        self.prev_state = Some(from);
    }
}

pub struct StateUnit {
    name: String,
    handler_name: String,
    state: Mutex<UnitState>,
    is_alive: AtomicBool,
    data: RwLock<Option<UnitData>>,
    created_at: DateTime<Utc>,
}

impl StateUnit {
    pub fn new(
        name: impl Into<String>,
        handler_name: impl Into<String>,
        initial_state: impl Into<String>,
        data: Option<UnitData>,
    ) -> Self {
        Self {
            name: name.into(),
            handler_name: handler_name.into(),
            state: Mutex::new(UnitState {
                cur_state: initial_state.into(),
                prev_state: None,
                next_event_key: None,
                success_result: None,
                fail_result: None,
            }),
            is_alive: AtomicBool::new(true),
            data: RwLock::new(data),
            created_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cur_state(&self) -> String {
        self.state.lock().cur_state.clone()
    }

    pub fn prev_state(&self) -> Option<String> {
        self.state.lock().prev_state.clone()
    }

    /// Key of the escalation currently armed for this unit
    pub fn next_event_key(&self) -> Option<String> {
        self.state.lock().next_event_key.clone()
    }

    pub fn success_result(&self) -> Option<Value> {
        self.state.lock().success_result.clone()
    }

    pub fn fail_result(&self) -> Option<Value> {
        self.state.lock().fail_result.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::Acquire)
    }

    /// Mark the unit dead. Returns true for the call that killed it.
    pub(crate) fn kill(&self) -> bool {
        self.is_alive.swap(false, Ordering::AcqRel)
    }

    /// Typed view of the attached data
    pub fn data<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.data.read().clone().and_then(|data| data.downcast::<T>().ok())
    }

    pub fn raw_data(&self) -> Option<UnitData> {
        self.data.read().clone()
    }

    pub fn set_data(&self, data: Option<UnitData>) {
        *self.data.write() = data;
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, UnitState> {
        self.state.lock()
    }

    pub(crate) fn store_success_result(&self, result: Option<Value>) {
        self.state.lock().success_result = result;
    }

    pub(crate) fn store_fail_result(&self, result: Option<Value>) {
        self.state.lock().fail_result = result;
    }

    /// New escalation key for an escalation armed on entering `to_state`
    pub(crate) fn escalation_key(&self, to_state: &str) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.name,
            to_state,
            Uuid::new_v4(),
            sep = ESCALATION_KEY_SEPARATOR
        )
    }

    pub fn snapshot(&self) -> StateUnitSnapshot {
        let state = self.state.lock();
        StateUnitSnapshot {
            name: self.name.clone(),
            handler_name: self.handler_name.clone(),
            cur_state: state.cur_state.clone(),
            prev_state: state.prev_state.clone(),
            next_event_key: state.next_event_key.clone(),
            is_alive: self.is_alive(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for StateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateUnit")
            .field("name", &self.name)
            .field("handler_name", &self.handler_name)
            .field("state", &*self.state.lock())
            .field("is_alive", &self.is_alive())
            .field("has_data", &self.data.read().is_some())
            .finish()
    }
}

impl fmt::Display for StateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "StateUnit({}@{}, cur={}, prev={})",
            self.name,
            self.handler_name,
            state.cur_state,
            state.prev_state.as_deref().unwrap_or("-")
        )
    }
}

/// Serializable point-in-time view of a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateUnitSnapshot {
    pub name: String,
    pub handler_name: String,
    pub cur_state: String,
    pub prev_state: Option<String>,
    pub next_event_key: Option<String>,
    pub is_alive: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct TrackContext {
        representation: &'static str,
        segment: u64,
    }

    #[test]
    fn test_transit_records_previous_state() {
        let unit = StateUnit::new("video-1", "dash", "IDLE", None);
        unit.lock().transit("MPD_DONE");
        assert_eq!(unit.cur_state(), "MPD_DONE");
        assert_eq!(unit.prev_state().as_deref(), Some("IDLE"));
    }

    #[test]
    fn test_typed_data_access() {
        let context: UnitData = Arc::new(TrackContext {
            representation: "720p",
            segment: 42,
        });
        let unit = StateUnit::new("video-1", "dash", "IDLE", Some(context));

        let track = unit.data::<TrackContext>().unwrap();
        assert_eq!(track.segment, 42);
        assert_eq!(track.representation, "720p");
        assert!(unit.data::<String>().is_none());

        unit.set_data(None);
        assert!(unit.data::<TrackContext>().is_none());
    }

    #[test]
    fn test_escalation_key_format() {
        let unit = StateUnit::new("audio-1", "dash", "IDLE", None);
        let key = unit.escalation_key("AUDIO_MEDIA_SEG_DONE");
        let parts: Vec<&str> = key.splitn(3, ESCALATION_KEY_SEPARATOR).collect();
        assert_eq!(parts[0], "audio-1");
        assert_eq!(parts[1], "AUDIO_MEDIA_SEG_DONE");
        assert!(Uuid::parse_str(parts[2]).is_ok());
        assert_ne!(key, unit.escalation_key("AUDIO_MEDIA_SEG_DONE"));
    }

    #[test]
    fn test_kill_is_one_way() {
        let unit = StateUnit::new("audio-1", "dash", "IDLE", None);
        assert!(unit.kill());
        assert!(!unit.kill());
        assert!(!unit.is_alive());
        assert!(!unit.snapshot().is_alive);
    }
}
