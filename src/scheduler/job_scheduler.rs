//! # Job Scheduler
//!
//! The live schedule of one domain: a fixed pool of executors plus the jobs
//! assigned to them. Jobs are spread over the executors round-robin; repeating
//! and delayed jobs get a fixed-rate timer that re-enqueues them into their
//! assigned executor.
//!
//! Every rearm tick re-checks the job before enqueueing. A cancelled job, or a
//! counted job with no runs left, stops its own timer and leaves the schedule
//! instead of being enqueued again, so a cancel racing a pending tick resolves
//! to a no-op.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::errors::{SchedulerError, SchedulerResult};
use super::executor::{ExecutorStats, JobExecutor};
use super::job::Job;
use super::timer::{TimerControl, TimerId, TimerService};
use crate::logging::log_job_operation;

struct ScheduledJob {
    job: Arc<Job>,
    executor_index: usize,
    timer_id: Option<TimerId>,
}

pub struct JobScheduler {
    domain: String,
    executors: Vec<Arc<JobExecutor>>,
    next_index: AtomicUsize,
    jobs: Arc<DashMap<String, ScheduledJob>>,
    timer: Arc<TimerService>,
}

impl JobScheduler {
    /// Create and start `pool_size` executors with queues of `queue_size`
    pub fn new(
        domain: impl Into<String>,
        pool_size: usize,
        queue_size: usize,
        tick: Duration,
        timer: Arc<TimerService>,
    ) -> SchedulerResult<Self> {
        let domain = domain.into();
        let mut executors: Vec<Arc<JobExecutor>> = Vec::with_capacity(pool_size);

        for index in 0..pool_size.max(1) {
            let executor = Arc::new(JobExecutor::new(domain.clone(), index, queue_size, tick));
            if let Err(e) = executor.start() {
                for started in &executors {
                    started.stop();
                }
                return Err(e);
            }
            executors.push(executor);
        }

        Ok(Self {
            domain,
            executors,
            next_index: AtomicUsize::new(0),
            jobs: Arc::new(DashMap::new()),
            timer,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn pool_size(&self) -> usize {
        self.executors.len()
    }

    fn next_executor_index(&self) -> usize {
        self.next_index.fetch_add(1, Ordering::Relaxed) % self.executors.len()
    }

    /// Register `job` and start running it.
    ///
    /// Duplicate names are rejected unless the earlier job already finished,
    /// in which case its stale entry is replaced. A job still live in another
    /// domain is refused.
    pub fn schedule(&self, job: Arc<Job>) -> SchedulerResult<()> {
        job.validate()?;

        let name = job.name().to_string();
        self.jobs.remove_if(&name, |_, entry| entry.job.is_finished());

        let executor_index = {
            let entry = match self.jobs.entry(name.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => {
                    return Err(SchedulerError::DuplicateJob {
                        domain: self.domain.clone(),
                        job: name,
                    });
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) => vacant,
            };
            if let Err(owner) = job.claim_schedule_domain(&self.domain) {
                return Err(SchedulerError::JobInOtherDomain {
                    job: name,
                    owner,
                    domain: self.domain.clone(),
                });
            }
            let executor_index = self.next_executor_index();
            entry.insert(ScheduledJob {
                job: Arc::clone(&job),
                executor_index,
                timer_id: None,
            });
            executor_index
        };

        if job.is_immediate() {
            return self.enqueue_now(&job, executor_index);
        }

        let timer_id = self.arm_rearm_timer(&job, executor_index);
        if let Some(mut entry) = self.jobs.get_mut(&name) {
            if Arc::ptr_eq(&entry.job, &job) {
                entry.timer_id = Some(timer_id);
            }
        }

        debug!(domain = %self.domain, job = %name, executor = executor_index, %timer_id, "Rearm timer armed");
        log_job_operation("schedule", &self.domain, &name, "armed", None);
        Ok(())
    }

    fn enqueue_now(&self, job: &Arc<Job>, executor_index: usize) -> SchedulerResult<()> {
        if !job.claim_run() {
            return Ok(());
        }
        if let Err(e) = self.executors[executor_index].enqueue(Arc::clone(job)) {
            job.release_run();
            self.jobs
                .remove_if(job.name(), |_, entry| Arc::ptr_eq(&entry.job, job));
            job.set_schedule_domain_key(None);
            return Err(e);
        }
        log_job_operation("schedule", &self.domain, job.name(), "enqueued", None);
        Ok(())
    }

    fn arm_rearm_timer(&self, job: &Arc<Job>, executor_index: usize) -> TimerId {
        let job = Arc::clone(job);
        let executor = Arc::clone(&self.executors[executor_index]);
        let jobs = Arc::clone(&self.jobs);
        let domain = self.domain.clone();
        // A one-shot delayed job still rides the fixed-rate timer; its second tick finds no runs left.
        let period = if job.interval().is_zero() {
            job.initial_delay().max(Duration::from_millis(1))
        } else {
            job.interval()
        };

        self.timer
            .schedule_at_fixed_rate(job.initial_delay(), period, move || {
                if !job.claim_run() {
                    jobs.remove_if(job.name(), |_, entry| Arc::ptr_eq(&entry.job, &job));
                    job.set_schedule_domain_key(None);
                    debug!(domain = %domain, job = %job.name(), "Rearm timer stopped");
                    return TimerControl::Stop;
                }
                if let Err(e) = executor.enqueue(Arc::clone(&job)) {
                    job.release_run();
                    warn!(domain = %domain, job = %job.name(), error = %e, "Dropped job run");
                }
                TimerControl::Continue
            })
    }

    /// Cancel `job`. Returns true if it was still part of this schedule.
    ///
    /// Idempotent; a run already executing is allowed to finish. A job owned
    /// by another domain is left untouched.
    pub fn cancel(&self, job: &Arc<Job>) -> SchedulerResult<bool> {
        match job.schedule_domain_key() {
            Some(owner) if owner != self.domain => Err(SchedulerError::DomainMismatch {
                job: job.name().to_string(),
                owner,
                domain: self.domain.clone(),
            }),
            Some(_) => Ok(self.cancel_owned(job)),
            None => Ok(false),
        }
    }

    fn cancel_owned(&self, job: &Arc<Job>) -> bool {
        job.cancel();
        let removed = self
            .jobs
            .remove_if(job.name(), |_, entry| Arc::ptr_eq(&entry.job, job));
        if let Some((_, entry)) = &removed {
            if let Some(timer_id) = entry.timer_id {
                self.timer.cancel(timer_id);
            }
            log_job_operation(
                "cancel",
                &self.domain,
                job.name(),
                "cancelled",
                Some(&format!("executor #{}", entry.executor_index)),
            );
        }
        job.set_schedule_domain_key(None);
        removed.is_some()
    }

    pub fn get_job(&self, name: &str) -> Option<Arc<Job>> {
        self.jobs.get(name).map(|entry| Arc::clone(&entry.job))
    }

    /// Jobs that are registered and not yet finished
    pub fn active_job_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|entry| !entry.job.is_finished())
            .count()
    }

    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn queued_job_count(&self) -> usize {
        self.executors.iter().map(|executor| executor.queue_len()).sum()
    }

    pub fn executor_stats(&self) -> Vec<ExecutorStats> {
        self.executors.iter().map(|executor| executor.stats()).collect()
    }

    /// Cancel every job, then stop and drain every executor
    pub fn stop(&self) {
        let jobs: Vec<Arc<Job>> = self
            .jobs
            .iter()
            .map(|entry| Arc::clone(&entry.job))
            .collect();
        for job in &jobs {
            self.cancel_owned(job);
        }
        for executor in &self.executors {
            executor.stop();
        }
        info!(
            domain = %self.domain,
            cancelled = jobs.len(),
            executors = self.executors.len(),
            "🛑 SCHEDULER: Domain stopped"
        );
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
