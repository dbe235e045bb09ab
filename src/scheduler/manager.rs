//! # Schedule Manager
//!
//! Registry of schedule domains. The registry map is guarded by its own
//! coarse lock; job registration and execution inside a domain never take it
//! for longer than a lookup.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::errors::{SchedulerError, SchedulerResult};
use super::job::Job;
use super::schedule_unit::ScheduleUnit;
use super::timer::TimerService;
use crate::config::SchedulerConfig;
use crate::constants::scheduler::{DEFAULT_EXECUTOR_TICK, DEFAULT_POOL_SIZE, DEFAULT_QUEUE_SIZE};

pub struct ScheduleManager {
    timer: Arc<TimerService>,
    default_pool_size: usize,
    default_queue_size: usize,
    executor_tick: Duration,
    units: RwLock<HashMap<String, Arc<ScheduleUnit>>>,
}

impl ScheduleManager {
    pub fn new(timer: Arc<TimerService>) -> Self {
        Self {
            timer,
            default_pool_size: DEFAULT_POOL_SIZE,
            default_queue_size: DEFAULT_QUEUE_SIZE,
            executor_tick: DEFAULT_EXECUTOR_TICK,
            units: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(timer: Arc<TimerService>, config: &SchedulerConfig) -> Self {
        Self {
            timer,
            default_pool_size: config.default_pool_size,
            default_queue_size: config.default_queue_size,
            executor_tick: config.executor_tick(),
            units: RwLock::new(HashMap::new()),
        }
    }

    fn resolve_sizes(&self, pool_size: usize, queue_size: usize) -> (usize, usize) {
        let pool_size = if pool_size == 0 { self.default_pool_size } else { pool_size };
        let queue_size = if queue_size == 0 { self.default_queue_size } else { queue_size };
        ScheduleUnit::normalize(pool_size, queue_size)
    }

    /// Create the domain `key`, or return it if it already exists with the
    /// same sizing. A different sizing is a conflict and the existing domain
    /// stays in effect.
    pub fn init_domain(
        &self,
        key: &str,
        pool_size: usize,
        queue_size: usize,
    ) -> SchedulerResult<Arc<ScheduleUnit>> {
        let (pool_size, queue_size) = self.resolve_sizes(pool_size, queue_size);

        let mut units = self.units.write();
        if let Some(existing) = units.get(key) {
            if existing.matches(pool_size, queue_size) {
                return Ok(Arc::clone(existing));
            }
            warn!(
                domain = %key,
                existing_pool_size = existing.pool_size(),
                requested_pool_size = pool_size,
                "Schedule domain already exists with different parameters"
            );
            return Err(SchedulerError::DomainConflict {
                key: key.to_string(),
                existing_pool_size: existing.pool_size(),
                existing_queue_size: existing.queue_size(),
                requested_pool_size: pool_size,
                requested_queue_size: queue_size,
            });
        }

        let unit = Arc::new(ScheduleUnit::new(
            key,
            pool_size,
            queue_size,
            self.executor_tick,
            Arc::clone(&self.timer),
        )?);
        units.insert(key.to_string(), Arc::clone(&unit));

        info!(
            domain = %key,
            pool_size,
            queue_size,
            "📅 SCHEDULER: Domain initialized"
        );
        Ok(unit)
    }

    pub fn schedule_unit(&self, key: &str) -> Option<Arc<ScheduleUnit>> {
        self.units.read().get(key).cloned()
    }

    fn require_unit(&self, key: &str) -> SchedulerResult<Arc<ScheduleUnit>> {
        self.schedule_unit(key)
            .ok_or_else(|| SchedulerError::DomainNotFound {
                key: key.to_string(),
            })
    }

    /// Register `job` in domain `key`
    pub fn schedule(&self, key: &str, job: Arc<Job>) -> SchedulerResult<()> {
        let unit = self.require_unit(key)?;
        let name = job.name().to_string();
        unit.scheduler().schedule(job).inspect_err(|e| {
            warn!(domain = %key, job = %name, error = %e, "Job rejected");
        })
    }

    /// Cancel `job` in domain `key`. Cancelling twice is harmless; a job
    /// registered in another domain is refused.
    pub fn cancel(&self, key: &str, job: &Arc<Job>) -> SchedulerResult<()> {
        let unit = self.require_unit(key)?;
        unit.scheduler().cancel(job).map(|_| ()).inspect_err(|e| {
            warn!(domain = %key, job = %job.name(), error = %e, "Cancel rejected");
        })
    }

    /// Cancel every job of domain `key`, stop its executors and forget it.
    /// A later `init_domain` for the same key starts fresh.
    pub fn stop_all(&self, key: &str) -> SchedulerResult<()> {
        let unit = self
            .units
            .write()
            .remove(key)
            .ok_or_else(|| SchedulerError::DomainNotFound {
                key: key.to_string(),
            })?;
        unit.scheduler().stop();
        Ok(())
    }

    /// Jobs registered and not finished in domain `key`; zero for an unknown domain
    pub fn active_job_count(&self, key: &str) -> usize {
        self.schedule_unit(key)
            .map(|unit| unit.scheduler().active_job_count())
            .unwrap_or(0)
    }

    pub fn queued_job_count(&self, key: &str) -> usize {
        self.schedule_unit(key)
            .map(|unit| unit.scheduler().queued_job_count())
            .unwrap_or(0)
    }

    pub fn domain_count(&self) -> usize {
        self.units.read().len()
    }

    pub fn domain_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.units.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stop every domain and clear the registry
    pub fn finish(&self) {
        let units: Vec<Arc<ScheduleUnit>> = self.units.write().drain().map(|(_, unit)| unit).collect();
        for unit in &units {
            unit.scheduler().stop();
        }
        info!(domains = units.len(), "🛑 SCHEDULER: All domains stopped");
    }
}

impl std::fmt::Debug for ScheduleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleManager")
            .field("domains", &self.domain_keys())
            .field("default_pool_size", &self.default_pool_size)
            .field("default_queue_size", &self.default_queue_size)
            .field("executor_tick", &self.executor_tick)
            .finish()
    }
}
