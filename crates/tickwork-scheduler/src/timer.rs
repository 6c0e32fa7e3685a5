//! A fixed-interval timer that drives one task.
//!
//! Unlike the [`Registry`](crate::Registry), the timer keeps no scheduling
//! state: it fires after `due_time`, then every `period`, and runs the task
//! to completion each time. There is no retry and no failure counting. A task
//! error or panic ends the timer and is reported to whoever stops or joins it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info};

use crate::service::BackgroundService;
use crate::{JobError, SchedulerError, TimerError};

/// Default interval between fires.
pub const DEFAULT_TIMER_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Default delay before the first fire.
pub const DEFAULT_TIMER_DUE_TIME: Duration = Duration::from_secs(30);

/// Shortest period the timer accepts; smaller values are raised to it.
const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

/// Work driven by a [`PeriodicTimer`].
#[async_trait]
pub trait TimerTask: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Guard consulted on every fire. Returning false skips this fire.
    fn should_run(&self) -> bool {
        true
    }

    /// Do the work. An `Err` stops the timer.
    async fn execute(&self) -> Result<(), JobError>;
}

/// Timing for a [`PeriodicTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub period: Duration,
    pub due_time: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_TIMER_PERIOD,
            due_time: DEFAULT_TIMER_DUE_TIME,
        }
    }
}

/// Runs one [`TimerTask`] on a fixed interval.
pub struct PeriodicTimer<T> {
    task: Arc<T>,
    config: TimerConfig,
}

impl<T: TimerTask> PeriodicTimer<T> {
    pub fn new(task: T) -> Self {
        Self::with_config(task, TimerConfig::default())
    }

    pub fn with_config(task: T, config: TimerConfig) -> Self {
        Self {
            task: Arc::new(task),
            config,
        }
    }

    pub fn config(&self) -> TimerConfig {
        self.config
    }

    /// Fire until shutdown is signalled or the task fails.
    ///
    /// A fire that arrives while the task is still running is delayed, never
    /// overlapped.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), TimerError> {
        let name = self.task.name().to_string();
        let period = self.config.period.max(MIN_TIMER_PERIOD);
        let mut ticker = interval_at(Instant::now() + self.config.due_time, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            timer = %name,
            period_secs = period.as_secs_f64(),
            due_secs = self.config.due_time.as_secs_f64(),
            "timer started"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }

                _ = ticker.tick() => {}
            }

            if !self.task.should_run() {
                debug!(timer = %name, "guard declined, skipping fire");
                continue;
            }

            debug!(timer = %name, "timer fired");
            if let Err(source) = self.task.execute().await {
                error!(timer = %name, error = %source, "timer task failed, timer stopped");
                return Err(TimerError::TaskFailed { name, source });
            }
        }

        info!(timer = %name, "timer stopped");
        Ok(())
    }

    /// Spawn the timer onto the runtime.
    pub fn start(self) -> TimerHandle {
        let name = self.task.name().to_string();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(shutdown_rx).await });
        TimerHandle {
            name,
            shutdown_tx,
            task: Some(task),
            outcome: None,
        }
    }
}

/// Handle to a running [`PeriodicTimer`].
pub struct TimerHandle {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<Result<(), TimerError>>>,
    outcome: Option<Result<(), TimerError>>,
}

impl TimerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait until the timer ends on its own, which only happens on a fault.
    ///
    /// The outcome is kept for [`TimerHandle::stop`].
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let joined = task.await;
            self.task = None;
            self.outcome = Some(flatten(&self.name, joined));
        }
    }

    /// Stop firing and wait for an in-flight run to finish.
    ///
    /// Returns the fault that ended the timer, if any.
    pub async fn stop(mut self) -> Result<(), TimerError> {
        let _ = self.shutdown_tx.send(true);
        self.finished().await;
        self.outcome.take().unwrap_or(Ok(()))
    }
}

fn flatten(
    name: &str,
    joined: Result<Result<(), TimerError>, tokio::task::JoinError>,
) -> Result<(), TimerError> {
    match joined {
        Ok(result) => result,
        Err(_) => Err(TimerError::TaskPanicked {
            name: name.to_string(),
        }),
    }
}

#[async_trait]
impl BackgroundService for TimerHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stop(self: Box<Self>) -> Result<(), SchedulerError> {
        Ok(TimerHandle::stop(*self).await?)
    }
}
