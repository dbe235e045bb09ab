//! # Engine
//!
//! Composition root owning the shared [`TimerService`], the
//! [`ScheduleManager`] and the [`StateManager`]. Everything that needs a timer
//! or a registry receives it from here; there are no process-wide singletons.
//!
//! ```rust,no_run
//! use dashflow_core::config::EngineConfig;
//! use dashflow_core::Engine;
//!
//! # fn main() -> dashflow_core::Result<()> {
//! let engine = Engine::new(EngineConfig::default())?;
//! let handler = engine.state_manager().add_state_handler("DashClientState");
//! # let _ = handler;
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ConfigManager, EngineConfig};
use crate::error::Result;
use crate::scheduler::{ScheduleManager, TimerService};
use crate::state_machine::StateManager;

const TIMER_NAME: &str = "dashflow";

pub struct Engine {
    config: EngineConfig,
    timer: Arc<TimerService>,
    schedule_manager: ScheduleManager,
    state_manager: StateManager,
    shut_down: AtomicBool,
}

/// Point-in-time view of the engine's registries
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub domains: Vec<String>,
    pub handlers: Vec<String>,
    pub state_units: usize,
    pub active_timers: usize,
}

impl Engine {
    /// Build the engine and pre-create every configured schedule domain
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let timer = TimerService::new(
            TIMER_NAME,
            config.timer.worker_threads,
            config.state_machine.task_threads,
        )?;
        let schedule_manager = ScheduleManager::from_config(Arc::clone(&timer), &config.scheduler);
        let state_manager = StateManager::new(Arc::clone(&timer));

        for domain in &config.scheduler.domains {
            schedule_manager.init_domain(&domain.key, domain.pool_size, domain.queue_size)?;
            debug!(domain = %domain.key, "Pre-created configured schedule domain");
        }

        info!(
            domains = schedule_manager.domain_count(),
            task_threads = config.state_machine.task_threads,
            "🚀 ENGINE: Started"
        );

        Ok(Self {
            config,
            timer,
            schedule_manager,
            state_manager,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn from_config_manager(config_manager: &ConfigManager) -> Result<Self> {
        Self::new(config_manager.config().clone())
    }

    /// Load configuration from the default location and build the engine
    pub fn from_default_config() -> Result<Self> {
        let config_manager = ConfigManager::load()?;
        Self::from_config_manager(&config_manager)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timer(&self) -> &Arc<TimerService> {
        &self.timer
    }

    pub fn schedule_manager(&self) -> &ScheduleManager {
        &self.schedule_manager
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    pub fn is_running(&self) -> bool {
        !self.shut_down.load(Ordering::Acquire)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.is_running(),
            domains: self.schedule_manager.domain_keys(),
            handlers: self.state_manager.handler_names(),
            state_units: self.state_manager.state_unit_count(),
            active_timers: self.timer.active_timers(),
        }
    }

    /// Stop state machines, then scheduler domains, then the timer.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state_manager.stop();
        self.schedule_manager.finish();
        self.timer.shutdown();
        info!("🛑 ENGINE: Stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("running", &self.is_running())
            .field("timer", &self.timer.name())
            .field("domains", &self.schedule_manager.domain_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;
    use crate::error::EngineError;

    #[test]
    fn test_configured_domains_are_precreated() {
        let mut config = EngineConfig::default();
        config.scheduler.domains.push(DomainConfig {
            key: "session-sweep".to_string(),
            pool_size: 1,
            queue_size: 4,
        });

        let engine = Engine::new(config).unwrap();
        let unit = engine.schedule_manager().schedule_unit("session-sweep").unwrap();
        assert_eq!(unit.pool_size(), 1);
        assert_eq!(unit.queue_size(), 4);
        assert_eq!(engine.status().domains, vec!["session-sweep".to_string()]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.timer.worker_threads = 0;
        assert!(matches!(
            Engine::new(config),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine.state_manager().add_state_handler("DashClientState");
        assert!(engine.is_running());

        engine.shutdown();
        engine.shutdown();
        assert!(!engine.is_running());
        assert!(engine.timer().is_shut_down());
        assert_eq!(engine.schedule_manager().domain_count(), 0);
    }
}
