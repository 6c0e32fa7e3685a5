//! The tick-driven scheduler loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::service::BackgroundService;
use crate::{Registry, SchedulerError, TickOutcome};

/// Default wait between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// The job scheduler.
///
/// Wakes every `tick_interval`, runs at most one due job from its
/// [`Registry`], and waits for the next tick only after that job finishes.
pub struct Scheduler {
    registry: Arc<Registry>,
    tick_interval: Duration,
}

impl Scheduler {
    /// Create a new scheduler over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run the scheduler loop until shutdown is signalled.
    ///
    /// Shutdown is checked while waiting for a tick and again before a job
    /// starts. A job already running is allowed to finish.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let queue_size = self.registry.len().await;
        info!(
            tick_secs = self.tick_interval.as_secs_f64(),
            queue_size, "scheduler starting"
        );

        loop {
            if *shutdown_rx.borrow() {
                info!("scheduler shutting down");
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("scheduler received shutdown signal");
                        break;
                    }
                    continue;
                }

                _ = sleep(self.tick_interval) => {}
            }

            if *shutdown_rx.borrow() {
                info!("shutdown requested, not starting new jobs");
                break;
            }

            if self.registry.tick().await == TickOutcome::Idle {
                debug!("no job due this tick");
            }
        }

        info!("scheduler shut down gracefully");
    }

    /// Spawn the loop onto the runtime.
    pub fn start(self) -> SchedulerHandle {
        let registry = Arc::clone(&self.registry);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(shutdown_rx).await });
        SchedulerHandle {
            registry,
            shutdown_tx,
            task,
        }
    }
}

/// Handle to a running [`Scheduler`].
pub struct SchedulerHandle {
    registry: Arc<Registry>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// The registry the loop is serving; jobs may still be added through it.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Signal shutdown and wait for the loop to exit.
    pub async fn stop(self) -> Result<(), SchedulerError> {
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| SchedulerError::LoopTerminated(e.to_string()))
    }
}

#[async_trait]
impl BackgroundService for SchedulerHandle {
    fn name(&self) -> &str {
        "scheduler"
    }

    async fn stop(self: Box<Self>) -> Result<(), SchedulerError> {
        SchedulerHandle::stop(*self).await
    }
}
