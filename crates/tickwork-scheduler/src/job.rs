//! The capability a schedulable unit of work provides.

use std::time::Duration;

use async_trait::async_trait;

use crate::JobError;

/// Backoff applied after a failed run when the job does not set its own.
pub const DEFAULT_DELAY_ON_ERROR: Duration = Duration::from_secs(60 * 60);

/// A named background job the registry can run.
///
/// Only `name` and `run` are required. The cadence hooks default to a
/// one-shot job that is eligible immediately and backs off for an hour
/// after a failure.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable identifier used in logs.
    fn name(&self) -> &str;

    /// Interval between successful runs. `None` makes the job one-shot.
    fn period(&self) -> Option<Duration> {
        None
    }

    /// Delay from registration until the first eligible run.
    fn due_time(&self) -> Option<Duration> {
        None
    }

    /// Delay before retrying after a failed run.
    fn delay_on_error(&self) -> Option<Duration> {
        None
    }

    /// Do the work. Any `Err` counts as a failed run.
    async fn run(&self) -> Result<(), JobError>;
}

/// The effective backoff for `job`.
pub(crate) fn backoff_for(job: &dyn Job) -> Duration {
    job.delay_on_error().unwrap_or(DEFAULT_DELAY_ON_ERROR)
}
