use thiserror::Error;

/// Errors surfaced by schedule domain and job registration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Schedule domain not found: {key}")]
    DomainNotFound { key: String },

    #[error(
        "Schedule domain {key} already exists with pool_size={existing_pool_size}, queue_size={existing_queue_size} \
         (requested pool_size={requested_pool_size}, queue_size={requested_queue_size})"
    )]
    DomainConflict {
        key: String,
        existing_pool_size: usize,
        existing_queue_size: usize,
        requested_pool_size: usize,
        requested_queue_size: usize,
    },

    #[error("Job {job} is already scheduled in domain {domain}")]
    DuplicateJob { domain: String, job: String },

    #[error("Job {job} is already scheduled in domain {owner}; it cannot also join domain {domain}")]
    JobInOtherDomain {
        job: String,
        owner: String,
        domain: String,
    },

    #[error("Job {job} belongs to domain {owner}, not {domain}")]
    DomainMismatch {
        job: String,
        owner: String,
        domain: String,
    },

    #[error("Invalid job {job}: {reason}")]
    InvalidJob { job: String, reason: String },

    #[error("Job {job} has already finished and cannot be rescheduled")]
    JobFinished { job: String },

    #[error("Executor #{index} of domain {domain} rejected job {job}: queue is full")]
    QueueFull {
        domain: String,
        index: usize,
        job: String,
    },

    #[error("Timer runtime error: {0}")]
    Runtime(String),
}

impl SchedulerError {
    pub fn invalid_job(job: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidJob {
            job: job.into(),
            reason: reason.into(),
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
