//! Daemon: runs scheduled jobs and timers until Ctrl-C.

use std::sync::Arc;

use futures_util::future::select_all;
use miette::Result;
use tracing::{error, info, warn};

use tickwork_scheduler::{
    BackgroundService, EntryState, Job, PeriodicTimer, Registry, Scheduler, TimerHandle,
};

use crate::command_job::CommandJob;
use crate::config::{ConfigError, DaemonConfig, JobMode};

/// Register scheduled jobs with `registry` and build a timer for every timer job.
pub async fn wire(
    config: &DaemonConfig,
    registry: &Registry,
) -> Result<Vec<PeriodicTimer<CommandJob>>, ConfigError> {
    let mut timers = Vec::new();
    for def in &config.jobs {
        let job = CommandJob::from_definition(def)?;
        match def.mode {
            JobMode::Scheduled => {
                registry.add_job(job).await;
            }
            JobMode::Timer => {
                let timer_config = def.timer_config(job.due_time());
                timers.push(PeriodicTimer::with_config(job, timer_config));
            }
        }
    }
    Ok(timers)
}

/// Run the daemon.
///
/// Returns an error if any service ended with a fault; a failed timer also
/// brings the whole daemon down.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let registry = Arc::new(Registry::new());
    let timers = wire(&config, &registry)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    let scheduler = Scheduler::new(Arc::clone(&registry))
        .with_tick_interval(config.tick_interval)
        .start();
    let mut timers: Vec<TimerHandle> = timers.into_iter().map(PeriodicTimer::start).collect();

    let scheduled = registry.len().await;
    info!(
        scheduled,
        timers = timers.len(),
        "daemon started"
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
        index = first_finished(&mut timers) => {
            error!(timer = %timers[index].name(), "timer ended unexpectedly, shutting down");
        }
    }

    let mut services: Vec<Box<dyn BackgroundService>> = vec![Box::new(scheduler)];
    services.extend(
        timers
            .into_iter()
            .map(|t| Box::new(t) as Box<dyn BackgroundService>),
    );

    let mut first_fault = None;
    for service in services {
        let name = service.name().to_string();
        if let Err(e) = service.stop().await {
            error!(service = %name, error = %e, "service stopped with a fault");
            first_fault.get_or_insert(e);
        }
    }

    for entry in registry.snapshot().await {
        if entry.state == EntryState::Disabled && entry.failed_attempts > 0 {
            warn!(
                job = %entry.name,
                entry = %entry.id,
                failed_attempts = entry.failed_attempts,
                last_error = entry.last_error.as_deref().unwrap_or(""),
                "job was disabled after repeated failures"
            );
        }
    }

    info!("daemon shutdown complete");

    match first_fault {
        Some(e) => Err(miette::miette!("{}", e)),
        None => Ok(()),
    }
}

/// Resolve with the index of the first timer to end on its own.
async fn first_finished(timers: &mut [TimerHandle]) -> usize {
    if timers.is_empty() {
        return std::future::pending().await;
    }
    let (_, index, _) = select_all(timers.iter_mut().map(|t| Box::pin(t.finished()))).await;
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobDefinition;
    use std::time::Duration;

    fn definition(name: &str, mode: JobMode) -> JobDefinition {
        JobDefinition {
            name: name.to_string(),
            command: "true".to_string(),
            args: vec![],
            period_secs: Some(60),
            due_secs: Some(2),
            at: None,
            delay_on_error_secs: None,
            mode,
        }
    }

    #[tokio::test]
    async fn wire_splits_jobs_by_mode() {
        let config = DaemonConfig {
            tick_interval: Duration::from_secs(1),
            jobs: vec![
                definition("a", JobMode::Scheduled),
                definition("b", JobMode::Timer),
                definition("c", JobMode::Scheduled),
            ],
        };
        let registry = Registry::new();

        let timers = wire(&config, &registry).await.unwrap();

        assert_eq!(registry.len().await, 2);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].config().period, Duration::from_secs(60));
        assert_eq!(timers[0].config().due_time, Duration::from_secs(2));

        let names: Vec<_> = registry
            .snapshot()
            .await
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn first_finished_reports_the_faulted_timer() {
        let mut failing = definition("broken", JobMode::Timer);
        failing.command = "/nonexistent/tickwork-binary".into();
        failing.due_secs = Some(0);
        let config = DaemonConfig {
            tick_interval: Duration::from_secs(1),
            jobs: vec![definition("fine", JobMode::Timer), failing],
        };

        let timers = wire(&config, &Registry::new()).await.unwrap();
        let mut handles: Vec<TimerHandle> = timers.into_iter().map(PeriodicTimer::start).collect();

        let index = first_finished(&mut handles).await;
        assert_eq!(handles[index].name(), "broken");

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.stop().await.is_err());
        }
        assert_eq!(results, vec![false, true]);
    }
}
