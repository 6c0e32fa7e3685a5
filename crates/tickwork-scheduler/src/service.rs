//! Lifecycle contract shared by everything a host starts and stops.

use async_trait::async_trait;

use crate::SchedulerError;

/// A running background service owned by a host.
///
/// Starting happens through each service's own constructor (for example
/// [`Scheduler::start`](crate::Scheduler::start)); the host only needs to
/// name and stop what it holds. Once `stop` returns, the service does no
/// further work.
#[async_trait]
pub trait BackgroundService: Send {
    fn name(&self) -> &str;

    async fn stop(self: Box<Self>) -> Result<(), SchedulerError>;
}
