//! Transition callbacks.
//!
//! Any `Fn(&StateUnit) -> Option<Value>` closure is a callback; types that
//! carry their own state can implement [`StateCallback`] directly. Callbacks
//! always run after the unit lock is released and must not fire events on the
//! same unit while holding locks the engine also needs.

use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

use super::unit::StateUnit;
use crate::constants::ResultCode;
use crate::scheduler::executor::panic_message;

pub trait StateCallback: Send + Sync {
    /// Runs against the unit that took part in the transition attempt.
    /// The returned value is stored on the unit.
    fn call(&self, unit: &StateUnit) -> Option<Value>;
}

impl<F> StateCallback for F
where
    F: Fn(&StateUnit) -> Option<Value> + Send + Sync,
{
    fn call(&self, unit: &StateUnit) -> Option<Value> {
        self(unit)
    }
}

pub type SharedCallback = Arc<dyn StateCallback>;

/// Which slot of a [`StateEvent`](super::StateEvent) a callback came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackKind {
    Success,
    Fail,
    Retry,
}

impl CallbackKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Retry => "retry",
        }
    }
}

/// Run `callback`, containing any panic so it cannot reach the caller of `fire`
pub(crate) fn invoke(
    callback: &dyn StateCallback,
    kind: CallbackKind,
    event: &str,
    unit: &StateUnit,
) -> Option<Value> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback.call(unit))) {
        Ok(result) => result,
        Err(payload) => {
            error!(
                code = %ResultCode::ThreadException,
                handler = %unit.handler_name(),
                unit = %unit.name(),
                event = %event,
                callback = kind.as_str(),
                panic = %panic_message(payload.as_ref()),
                "State callback panicked"
            );
            None
        }
    }
}
