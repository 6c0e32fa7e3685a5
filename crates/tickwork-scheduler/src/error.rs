//! Error types for the scheduler.

use thiserror::Error;

/// Boxed error type accepted from job bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors a job body can report from [`Job::run`](crate::Job::run).
///
/// Every variant counts as a failed run; the scheduler does not distinguish
/// between them when applying backoff.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job failed with a plain message.
    #[error("{0}")]
    Failed(String),

    /// The job body panicked while running.
    #[error("job panicked: {0}")]
    Panicked(String),

    /// Any other error raised by the job body.
    #[error(transparent)]
    Other(#[from] BoxError),
}

impl JobError {
    /// Build a [`JobError::Failed`] from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wrap an arbitrary error.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }
}

/// Errors from parsing a wall-clock due time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DueTimeError {
    /// The input is not a 24-hour `HH:mm` string.
    #[error("invalid time of day '{0}', expected HH:mm (00:00-23:59)")]
    InvalidFormat(String),

    /// The time of day falls in a gap of the local time zone (DST change).
    #[error("time of day '{0}' does not exist in the local time zone")]
    NonexistentLocalTime(String),
}

/// Faults that end a periodic timer.
#[derive(Debug, Error)]
pub enum TimerError {
    /// The task returned an error; the timer stopped firing.
    #[error("timer task '{name}' failed: {source}")]
    TaskFailed {
        name: String,
        #[source]
        source: JobError,
    },

    /// The task panicked; the timer task was torn down.
    #[error("timer task '{name}' panicked")]
    TaskPanicked { name: String },
}

/// Errors from the scheduler lifecycle.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler loop task panicked or was aborted.
    #[error("scheduler loop terminated abnormally: {0}")]
    LoopTerminated(String),

    /// A periodic timer ended with a fault.
    #[error(transparent)]
    Timer(#[from] TimerError),
}
