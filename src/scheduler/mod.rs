//! # Job Scheduler
//!
//! Priority-ordered, multi-worker scheduling of one-shot and repeating jobs.
//!
//! ## Architecture
//!
//! - **ScheduleManager**: registry of named schedule domains
//! - **ScheduleUnit / JobScheduler**: one domain, a fixed pool of executors and
//!   its live jobs
//! - **JobExecutor**: one worker thread draining a bounded priority queue, one
//!   job per tick
//! - **TimerService**: the shared timer wheel that rearms repeating jobs and
//!   drives state machine escalations
//!
//! Work assigned to the same executor is strictly serialized; different
//! executors run in parallel.

pub mod errors;
pub mod executor;
pub mod job;
pub mod job_scheduler;
pub mod manager;
pub mod schedule_unit;
pub mod timer;

pub use errors::{SchedulerError, SchedulerResult};
pub use executor::{ExecutorStats, JobExecutor};
pub use job::{Job, JobBuilder, JobContainer, JobTask};
pub use job_scheduler::JobScheduler;
pub use manager::ScheduleManager;
pub use schedule_unit::ScheduleUnit;
pub use timer::{TimerControl, TimerId, TimerService};
