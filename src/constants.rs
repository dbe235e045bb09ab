//! # System Constants
//!
//! Defaults and result codes that define the operational boundaries of the
//! scheduling and state machine engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Scheduler defaults
pub mod scheduler {
    use super::Duration;

    /// Executors created for a domain when a pool size of zero is requested
    pub const DEFAULT_POOL_SIZE: usize = 5;
    /// Per-executor queue capacity used when zero is requested
    pub const DEFAULT_QUEUE_SIZE: usize = 10;
    /// Period of the executor dequeue tick
    pub const DEFAULT_EXECUTOR_TICK: Duration = Duration::from_millis(1);
    /// How long `stop` waits for an executor thread to wind down
    pub const EXECUTOR_JOIN_TIMEOUT: Duration = Duration::from_secs(5);
}

/// State machine defaults
pub mod state_machine {
    /// Blocking threads available to escalation firings
    pub const DEFAULT_TASK_THREADS: usize = 2;
    /// Separator used in escalation keys (`unit:state:uuid`)
    pub const ESCALATION_KEY_SEPARATOR: char = ':';
}

/// Numeric result codes attached to engine log records.
///
/// The 1000 range marks successful bookkeeping, 2000 failures, and 3000
/// validation problems, so operators can grep a single code across logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    SuccessAddState,
    SuccessRemoveState,
    SuccessTransitState,
    SuccessAddStateTaskUnit,
    SuccessRemoveStateTaskUnit,
    SuccessAddRetryUnit,
    SuccessRemoveRetryUnit,

    FailAddState,
    FailRemoveState,
    FailTransitState,
    FailGetStateHandler,
    FailGetEvent,
    FailAddEvent,
    FailGetStateTaskUnit,
    FailAddStateTaskUnit,
    FailRemoveStateTaskUnit,
    FailGetRetryUnit,

    DuplicatedState,
    DuplicatedEvent,
    DuplicatedKey,
    SameState,
    NullObject,
    ThreadException,
    NotPositiveInteger,
}

impl ResultCode {
    pub fn code(&self) -> u16 {
        match self {
            Self::SuccessAddState => 1000,
            Self::SuccessRemoveState => 1001,
            Self::SuccessTransitState => 1002,
            Self::SuccessAddStateTaskUnit => 1020,
            Self::SuccessRemoveStateTaskUnit => 1021,
            Self::SuccessAddRetryUnit => 1030,
            Self::SuccessRemoveRetryUnit => 1031,

            Self::FailAddState => 2000,
            Self::FailRemoveState => 2001,
            Self::FailTransitState => 2002,
            Self::FailGetStateHandler => 2005,
            Self::FailGetEvent => 2006,
            Self::FailAddEvent => 2007,
            Self::FailGetStateTaskUnit => 2030,
            Self::FailAddStateTaskUnit => 2031,
            Self::FailRemoveStateTaskUnit => 2032,
            Self::FailGetRetryUnit => 2040,

            Self::DuplicatedState => 3000,
            Self::DuplicatedEvent => 3001,
            Self::DuplicatedKey => 3002,
            Self::SameState => 3011,
            Self::NullObject => 3100,
            Self::ThreadException => 3200,
            Self::NotPositiveInteger => 3300,
        }
    }

    pub fn is_success(&self) -> bool {
        (1000..2000).contains(&self.code())
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_ranges() {
        assert!(ResultCode::SuccessTransitState.is_success());
        assert!(!ResultCode::FailTransitState.is_success());
        assert!(!ResultCode::DuplicatedEvent.is_success());
        assert_eq!(ResultCode::FailTransitState.to_string(), "2002");
    }
}
