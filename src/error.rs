//! Error types for the Dashflow engine.
//!
//! Each subsystem owns a focused error enum; `EngineError` is the umbrella type
//! returned by the composition root and anything that spans subsystems.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::scheduler::SchedulerError;
use crate::state_machine::StateMachineError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Runtime(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_errors_convert_into_engine_error() {
        let err: EngineError = SchedulerError::DomainNotFound {
            key: "main".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::Scheduler(_)));
        assert_eq!(
            err.to_string(),
            "Scheduler error: Schedule domain not found: main"
        );

        let err: EngineError = StateMachineError::DuplicateEvent {
            event: "GET_MPD".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::StateMachine(_)));
    }
}
