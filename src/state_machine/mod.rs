// State machine module for timeout-driven transitions
//
// Units transition either explicitly through `fire` or implicitly when an
// escalation armed by an earlier transition times out. Escalations retry up to
// a ceiling before their fallback transition is allowed to take effect.

pub mod callback;
pub mod condition;
pub mod errors;
pub mod event;
pub mod event_manager;
pub mod handler;
pub mod manager;
pub mod retry;
pub mod task;
pub mod unit;

// Re-export main types for convenient access
pub use callback::{SharedCallback, StateCallback};
pub use condition::{EventCondition, StateScheduler};
pub use errors::{StateMachineError, StateMachineResult};
pub use event::{Escalation, StateEvent, StateEventBuilder};
pub use event_manager::StateEventManager;
pub use handler::StateHandler;
pub use manager::StateManager;
pub use retry::{RetryManager, RetryStatus, RetryUnit};
pub use task::{StateTask, StateTaskManager};
pub use unit::{StateUnit, StateUnitSnapshot, UnitData};

/// How a transition attempt was triggered
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// Application code called `fire`
    Explicit,
    /// An escalation timer fired; carries the key it was armed with
    Scheduled { escalation_key: String },
}
