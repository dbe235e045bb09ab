use thiserror::Error;

use crate::constants::ResultCode;

/// Registration and lookup failures of the state machine layer.
///
/// A from-state mismatch during a transition is not an error; it is reported
/// through the event's fail callback instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Event {event} is already registered")]
    DuplicateEvent { event: String },

    #[error("Event {event} declares no from-states")]
    EmptyFromStates { event: String },

    #[error("Event {event} targets {state}, which is also one of its from-states")]
    ToStateInFromStates { event: String, state: String },

    #[error("Invalid event {event}: {reason}")]
    InvalidEvent { event: String, reason: String },

    #[error("Event not found: {event}")]
    EventNotFound { event: String },

    #[error("State handler not found: {handler}")]
    HandlerNotFound { handler: String },

    #[error("State unit {unit} already exists")]
    DuplicateUnit { unit: String },

    #[error("State unit not found: {unit}")]
    UnitNotFound { unit: String },

    #[error("An event condition for {handler}/{event} is already registered")]
    DuplicateCondition { handler: String, event: String },
}

impl StateMachineError {
    pub fn invalid_event(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// Result code logged alongside this failure
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::DuplicateEvent { .. } => ResultCode::DuplicatedEvent,
            Self::EmptyFromStates { .. } | Self::InvalidEvent { .. } => ResultCode::FailAddEvent,
            Self::ToStateInFromStates { .. } => ResultCode::SameState,
            Self::EventNotFound { .. } => ResultCode::FailGetEvent,
            Self::HandlerNotFound { .. } => ResultCode::FailGetStateHandler,
            Self::DuplicateUnit { .. } => ResultCode::DuplicatedState,
            Self::UnitNotFound { .. } => ResultCode::FailRemoveState,
            Self::DuplicateCondition { .. } => ResultCode::DuplicatedKey,
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
