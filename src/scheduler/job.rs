//! # Jobs
//!
//! A `Job` describes what to run, how often, at what priority and how many
//! times. Jobs are shared (`Arc<Job>`) between the caller, the rearm timer and
//! the executor queue, so every mutable attribute is atomic or lock-guarded.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::errors::{SchedulerError, SchedulerResult};

/// The body of a job. Errors are logged by the executor and otherwise ignored.
pub type JobTask = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

pub struct Job {
    name: String,
    initial_delay: Duration,
    interval: Duration,
    priority: i32,
    total_run_count: u32,
    is_lasted: bool,
    task: JobTask,
    remaining_run_count: AtomicU32,
    in_flight: AtomicU32,
    is_cancelled: AtomicBool,
    is_finished: AtomicBool,
    schedule_domain_key: RwLock<Option<String>>,
    created_at: DateTime<Utc>,
}

impl Job {
    pub fn builder(name: impl Into<String>) -> JobBuilder {
        JobBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Lower values run first within one executor
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn total_run_count(&self) -> u32 {
        self.total_run_count
    }

    /// Repeats on `interval` until cancelled
    pub fn is_lasted(&self) -> bool {
        self.is_lasted
    }

    pub fn remaining_run_count(&self) -> u32 {
        self.remaining_run_count.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished.load(Ordering::Acquire)
    }

    /// True once the job was cancelled rather than running out of runs
    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.load(Ordering::Acquire)
    }

    /// Runs claimed for an executor queue that have not completed yet
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Domain the job is currently registered in, if any
    pub fn schedule_domain_key(&self) -> Option<String> {
        self.schedule_domain_key.read().clone()
    }

    pub(crate) fn set_schedule_domain_key(&self, key: Option<String>) {
        *self.schedule_domain_key.write() = key;
    }

    /// Bind the job to `domain` unless a live registration in another domain
    /// holds it. On refusal the owning domain is returned.
    pub(crate) fn claim_schedule_domain(&self, domain: &str) -> Result<(), String> {
        let mut key = self.schedule_domain_key.write();
        match key.as_deref() {
            Some(owner) if owner != domain && !self.is_finished() => Err(owner.to_string()),
            _ => {
                *key = Some(domain.to_string());
                Ok(())
            }
        }
    }

    /// Mark the job terminal. Returns true only for the call that finished it.
    pub(crate) fn mark_finished(&self) -> bool {
        !self.is_finished.swap(true, Ordering::AcqRel)
    }

    /// Cancel the job: queued runs are skipped and no rearm happens.
    /// Returns true only for the first cancellation.
    pub(crate) fn cancel(&self) -> bool {
        let first = !self.is_cancelled.swap(true, Ordering::AcqRel);
        self.mark_finished();
        first
    }

    /// Reserve one run before the job is enqueued.
    ///
    /// Lasted jobs always succeed. Counted jobs fail once every run has been
    /// claimed, which is the signal to stop the rearm timer.
    pub(crate) fn claim_run(&self) -> bool {
        if self.is_finished() {
            return false;
        }
        if !self.is_lasted
            && self
                .remaining_run_count
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
                .is_err()
        {
            return false;
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Give back a run claimed for an enqueue that was rejected
    pub(crate) fn release_run(&self) {
        if !self.is_lasted {
            self.remaining_run_count.fetch_add(1, Ordering::AcqRel);
        }
        self.settle_in_flight();
    }

    /// Record that a claimed run left the executor queue, whether it ran or
    /// was skipped. Returns true when this completion finished the job.
    pub(crate) fn complete_run(&self) -> bool {
        let in_flight = self.settle_in_flight();
        if in_flight == 0 && self.is_exhausted() {
            return self.mark_finished();
        }
        false
    }

    fn settle_in_flight(&self) -> u32 {
        match self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    /// True once a counted job has used every run
    pub(crate) fn is_exhausted(&self) -> bool {
        !self.is_lasted && self.remaining_run_count() == 0
    }

    /// Execute the body on the calling thread
    pub fn run(&self) -> anyhow::Result<()> {
        (self.task)()
    }

    /// Registration-time checks; a rejected job is never scheduled
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.name.trim().is_empty() {
            return Err(SchedulerError::invalid_job(&self.name, "name must not be empty"));
        }
        if self.is_lasted && self.interval.is_zero() {
            return Err(SchedulerError::invalid_job(
                &self.name,
                "a lasted job requires a positive interval",
            ));
        }
        if !self.is_lasted && self.total_run_count > 1 && self.interval.is_zero() {
            return Err(SchedulerError::invalid_job(
                &self.name,
                format!(
                    "{} runs requested without a positive interval",
                    self.total_run_count
                ),
            ));
        }
        if self.is_finished() {
            return Err(SchedulerError::JobFinished {
                job: self.name.clone(),
            });
        }
        Ok(())
    }

    /// One-shot jobs with no delay skip the rearm timer
    pub(crate) fn is_immediate(&self) -> bool {
        !self.is_lasted && self.total_run_count == 1 && self.initial_delay.is_zero()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("initial_delay", &self.initial_delay)
            .field("interval", &self.interval)
            .field("priority", &self.priority)
            .field("total_run_count", &self.total_run_count)
            .field("is_lasted", &self.is_lasted)
            .field("remaining_run_count", &self.remaining_run_count())
            .field("in_flight", &self.in_flight())
            .field("is_cancelled", &self.is_cancelled())
            .field("is_finished", &self.is_finished())
            .field("schedule_domain_key", &self.schedule_domain_key())
            .finish()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Job({}, priority={}, interval={}ms, lasted={}, remaining={})",
            self.name,
            self.priority,
            self.interval.as_millis(),
            self.is_lasted,
            self.remaining_run_count()
        )
    }
}

/// Fluent construction of [`Job`]s
pub struct JobBuilder {
    name: String,
    initial_delay: Duration,
    interval: Duration,
    priority: i32,
    total_run_count: u32,
    is_lasted: bool,
    task: Option<JobTask>,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_delay: Duration::ZERO,
            interval: Duration::ZERO,
            priority: 0,
            total_run_count: 1,
            is_lasted: false,
            task: None,
        }
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Number of runs for a non-lasted job; zero is treated as one
    pub fn total_run_count(mut self, count: u32) -> Self {
        self.total_run_count = count.max(1);
        self
    }

    pub fn lasted(mut self, lasted: bool) -> Self {
        self.is_lasted = lasted;
        self
    }

    pub fn task<F>(mut self, task: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.task = Some(Arc::new(task));
        self
    }

    /// Build the job. A job without a body is rejected.
    pub fn build(self) -> SchedulerResult<Arc<Job>> {
        let task = self
            .task
            .ok_or_else(|| SchedulerError::invalid_job(&self.name, "no task body was provided"))?;

        let job = Job {
            remaining_run_count: AtomicU32::new(self.total_run_count),
            in_flight: AtomicU32::new(0),
            is_cancelled: AtomicBool::new(false),
            name: self.name,
            initial_delay: self.initial_delay,
            interval: self.interval,
            priority: self.priority,
            total_run_count: self.total_run_count,
            is_lasted: self.is_lasted,
            task,
            is_finished: AtomicBool::new(false),
            schedule_domain_key: RwLock::new(None),
            created_at: Utc::now(),
        };
        job.validate()?;
        Ok(Arc::new(job))
    }
}

/// A long-lived component that owns one scheduled job.
///
/// Housekeeping sweeps (stale sessions, old segment files, health reports)
/// implement this so the composition root can start them uniformly.
pub trait JobContainer: Send + Sync {
    /// The job this container drives
    fn job(&self) -> Arc<Job>;

    /// Schedule the container's job into `domain`
    fn start(&self, manager: &super::ScheduleManager, domain: &str) -> SchedulerResult<()> {
        manager.schedule(domain, self.job())
    }

    /// Cancel the container's job wherever it is scheduled
    fn stop(&self, manager: &super::ScheduleManager) -> SchedulerResult<()> {
        let job = self.job();
        match job.schedule_domain_key() {
            Some(domain) => manager.cancel(&domain, &job),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_builder_defaults_to_single_run() {
        let job = Job::builder("sweep").task(noop).build().unwrap();
        assert_eq!(job.total_run_count(), 1);
        assert_eq!(job.remaining_run_count(), 1);
        assert!(!job.is_lasted());
        assert!(job.is_immediate());
        assert!(job.schedule_domain_key().is_none());
    }

    #[test]
    fn test_zero_run_count_is_treated_as_one() {
        let job = Job::builder("once")
            .total_run_count(0)
            .task(noop)
            .build()
            .unwrap();
        assert_eq!(job.total_run_count(), 1);
    }

    #[test]
    fn test_lasted_job_requires_interval() {
        let err = Job::builder("health")
            .lasted(true)
            .task(noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidJob { .. }));
    }

    #[test]
    fn test_repeated_job_requires_interval() {
        let err = Job::builder("three-times")
            .total_run_count(3)
            .task(noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidJob { .. }));
    }

    #[test]
    fn test_missing_task_is_rejected() {
        assert!(Job::builder("empty").build().is_err());
    }

    #[test]
    fn test_claim_run_counts_down_and_releases() {
        let job = Job::builder("twice")
            .interval(Duration::from_millis(10))
            .total_run_count(2)
            .task(noop)
            .build()
            .unwrap();

        assert!(job.claim_run());
        assert!(job.claim_run());
        assert!(!job.claim_run());
        assert!(job.is_exhausted());
        assert_eq!(job.in_flight(), 2);

        job.release_run();
        assert_eq!(job.remaining_run_count(), 1);
        assert!(job.claim_run());
    }

    #[test]
    fn test_job_finishes_when_last_claimed_run_completes() {
        let job = Job::builder("twice")
            .interval(Duration::from_millis(10))
            .total_run_count(2)
            .task(noop)
            .build()
            .unwrap();

        assert!(job.claim_run());
        assert!(job.claim_run());
        assert!(!job.complete_run(), "one run is still queued");
        assert!(!job.is_finished());
        assert!(job.complete_run());
        assert!(job.is_finished());
        assert!(!job.is_cancelled());
    }

    #[test]
    fn test_lasted_job_claims_until_finished() {
        let job = Job::builder("forever")
            .lasted(true)
            .interval(Duration::from_millis(10))
            .task(noop)
            .build()
            .unwrap();

        for _ in 0..100 {
            assert!(job.claim_run());
        }
        assert!(job.cancel());
        assert!(!job.cancel());
        assert!(job.is_finished());
        assert!(!job.claim_run());
    }

    #[test]
    fn test_domain_claim_is_exclusive_while_live() {
        let job = Job::builder("sweep").task(noop).build().unwrap();
        assert_eq!(job.claim_schedule_domain("a"), Ok(()));
        assert_eq!(job.claim_schedule_domain("a"), Ok(()));
        assert_eq!(job.claim_schedule_domain("b"), Err("a".to_string()));
        assert_eq!(job.schedule_domain_key().as_deref(), Some("a"));

        job.cancel();
        assert_eq!(job.claim_schedule_domain("b"), Ok(()));
    }
}
