//! # Dashflow Configuration System
//!
//! YAML-based configuration for the scheduling and state machine engine.
//!
//! ## Architecture
//!
//! - **Single Source of Truth**: one `dashflow-config.yaml` per deployment
//! - **Environment Awareness**: `development`/`test`/`production` sections
//!   override the base document
//! - **Environment Variables**: `DASHFLOW__SECTION__KEY` overrides any value
//! - **Explicit Validation**: invalid sizing is rejected at load time
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dashflow_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?;
//! let pool_size = config.config().scheduler.default_pool_size;
//! let tick = config.config().scheduler.executor_tick();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::{scheduler, state_machine};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub state_machine: StateMachineConfig,
    pub timer: TimerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Executors per domain when a domain asks for zero
    pub default_pool_size: usize,
    /// Queue capacity per executor when a domain asks for zero
    pub default_queue_size: usize,
    pub executor_tick_ms: u64,
    /// Domains created when the engine starts
    pub domains: Vec<DomainConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_pool_size: scheduler::DEFAULT_POOL_SIZE,
            default_queue_size: scheduler::DEFAULT_QUEUE_SIZE,
            executor_tick_ms: scheduler::DEFAULT_EXECUTOR_TICK.as_millis() as u64,
            domains: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn executor_tick(&self) -> Duration {
        Duration::from_millis(self.executor_tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainConfig {
    pub key: String,
    #[serde(default)]
    pub pool_size: usize,
    #[serde(default)]
    pub queue_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StateMachineConfig {
    /// Escalation firings that may run callbacks at the same time
    pub task_threads: usize,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            task_threads: state_machine::DEFAULT_TASK_THREADS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimerConfig {
    /// Runtime worker threads driving the timer wheel
    pub worker_threads: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { worker_threads: 1 }
    }
}

impl EngineConfig {
    /// Validate the configuration for consistency
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scheduler.default_pool_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.default_pool_size",
                "0",
                "must be greater than 0",
            ));
        }
        if self.scheduler.default_queue_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.default_queue_size",
                "0",
                "must be greater than 0",
            ));
        }
        if self.scheduler.executor_tick_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.executor_tick_ms",
                "0",
                "must be greater than 0",
            ));
        }
        if self.state_machine.task_threads == 0 {
            return Err(ConfigurationError::invalid_value(
                "state_machine.task_threads",
                "0",
                "must be greater than 0",
            ));
        }
        if self.timer.worker_threads == 0 {
            return Err(ConfigurationError::invalid_value(
                "timer.worker_threads",
                "0",
                "must be greater than 0",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for domain in &self.scheduler.domains {
            if domain.key.trim().is_empty() {
                return Err(ConfigurationError::validation_error(
                    "scheduler.domains entries require a non-empty key",
                ));
            }
            if !seen.insert(domain.key.as_str()) {
                return Err(ConfigurationError::validation_error(format!(
                    "schedule domain '{}' is declared more than once",
                    domain.key
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.default_pool_size, 5);
        assert_eq!(config.scheduler.executor_tick(), Duration::from_millis(1));
        assert_eq!(config.state_machine.task_threads, 2);
    }

    #[test]
    fn test_duplicate_domains_are_rejected() {
        let mut config = EngineConfig::default();
        for _ in 0..2 {
            config.scheduler.domains.push(DomainConfig {
                key: "sweep".to_string(),
                pool_size: 1,
                queue_size: 1,
            });
        }
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_zero_sizes_are_rejected() {
        let mut config = EngineConfig::default();
        config.state_machine.task_threads = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }
}
