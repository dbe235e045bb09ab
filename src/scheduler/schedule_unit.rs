use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::errors::SchedulerResult;
use super::job_scheduler::JobScheduler;
use super::timer::TimerService;
use crate::constants::scheduler::{DEFAULT_POOL_SIZE, DEFAULT_QUEUE_SIZE};

/// One schedule domain: its normalized sizing and live [`JobScheduler`]
pub struct ScheduleUnit {
    key: String,
    pool_size: usize,
    queue_size: usize,
    created_at: DateTime<Utc>,
    scheduler: JobScheduler,
}

impl ScheduleUnit {
    pub fn new(
        key: impl Into<String>,
        pool_size: usize,
        queue_size: usize,
        tick: Duration,
        timer: Arc<TimerService>,
    ) -> SchedulerResult<Self> {
        let key = key.into();
        let (pool_size, queue_size) = Self::normalize(pool_size, queue_size);
        let scheduler = JobScheduler::new(key.clone(), pool_size, queue_size, tick, timer)?;
        Ok(Self {
            key,
            pool_size,
            queue_size,
            created_at: Utc::now(),
            scheduler,
        })
    }

    /// Zero sizes fall back to the defaults
    pub fn normalize(pool_size: usize, queue_size: usize) -> (usize, usize) {
        let pool_size = if pool_size == 0 { DEFAULT_POOL_SIZE } else { pool_size };
        let queue_size = if queue_size == 0 { DEFAULT_QUEUE_SIZE } else { queue_size };
        (pool_size, queue_size)
    }

    /// True when a request for these sizes describes this same domain
    pub fn matches(&self, pool_size: usize, queue_size: usize) -> bool {
        Self::normalize(pool_size, queue_size) == (self.pool_size, self.queue_size)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }
}

impl fmt::Debug for ScheduleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleUnit")
            .field("key", &self.key)
            .field("pool_size", &self.pool_size)
            .field("queue_size", &self.queue_size)
            .field("created_at", &self.created_at)
            .field("active_jobs", &self.scheduler.active_job_count())
            .finish()
    }
}
