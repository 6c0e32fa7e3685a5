//! Jobs that run an external program.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use tickwork_scheduler::{Job, JobError, TimerTask};

use crate::config::{ConfigError, JobDefinition};

/// Longest stderr excerpt carried into a failure message.
const STDERR_EXCERPT_LEN: usize = 512;

/// Runs a program to completion; a non-zero exit is a failed run.
#[derive(Debug, Clone)]
pub struct CommandJob {
    name: String,
    program: String,
    args: Vec<String>,
    period: Option<Duration>,
    due_time: Option<Duration>,
    delay_on_error: Option<Duration>,
}

impl CommandJob {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            period: None,
            due_time: None,
            delay_on_error: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Build from a jobs-file entry, resolving its start time now.
    pub fn from_definition(def: &JobDefinition) -> Result<Self, ConfigError> {
        let mut job = Self::new(def.name.as_str(), def.command.as_str()).with_args(&def.args);
        job.period = def.period();
        job.due_time = def.initial_delay()?;
        job.delay_on_error = def.delay_on_error();
        Ok(job)
    }

    async fn spawn(&self) -> Result<(), JobError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| JobError::msg(format!("failed to start '{}': {e}", self.program)))?;

        debug!(
            job = %self.name,
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            "command exited"
        );

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Err(JobError::msg(format!("{} ({})", self.program, output.status)))
        } else {
            let excerpt: String = stderr.chars().take(STDERR_EXCERPT_LEN).collect();
            Err(JobError::msg(format!(
                "{} ({}): {excerpt}",
                self.program, output.status
            )))
        }
    }
}

#[async_trait]
impl Job for CommandJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> Option<Duration> {
        self.period
    }

    fn due_time(&self) -> Option<Duration> {
        self.due_time
    }

    fn delay_on_error(&self) -> Option<Duration> {
        self.delay_on_error
    }

    async fn run(&self) -> Result<(), JobError> {
        self.spawn().await
    }
}

#[async_trait]
impl TimerTask for CommandJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), JobError> {
        self.spawn().await
    }
}
