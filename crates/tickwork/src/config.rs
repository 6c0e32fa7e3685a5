//! Job definitions loaded from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use tickwork_scheduler::{DueTimeError, TimerConfig, due_time};

/// Errors from loading or validating job definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid job '{name}': {reason}")]
    Invalid { name: String, reason: String },

    #[error("invalid start time for job '{name}': {source}")]
    StartTime {
        name: String,
        #[source]
        source: DueTimeError,
    },
}

/// How a job is driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Registered with the shared scheduler (backoff, disable after repeated failures).
    #[default]
    Scheduled,
    /// Run by its own periodic timer (no retry; a failure stops the daemon).
    Timer,
}

/// One job as written in the jobs file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDefinition {
    pub name: String,
    /// Program to execute.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Seconds between successful runs. Absent means run once.
    pub period_secs: Option<u64>,
    /// Seconds from startup until the first run.
    pub due_secs: Option<u64>,
    /// Wall-clock `HH:mm` of the first run, as an alternative to `due_secs`.
    pub at: Option<String>,
    /// Seconds to wait before retrying after a failure.
    pub delay_on_error_secs: Option<u64>,
    #[serde(default)]
    pub mode: JobMode,
}

impl JobDefinition {
    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Check the definition for contradictions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("name must not be empty"));
        }
        if self.command.trim().is_empty() {
            return Err(self.invalid("command must not be empty"));
        }
        if self.period_secs == Some(0) {
            return Err(self.invalid("period_secs must be greater than zero"));
        }
        if self.at.is_some() && self.due_secs.is_some() {
            return Err(self.invalid("set either 'at' or 'due_secs', not both"));
        }
        if let Some(at) = &self.at {
            due_time::parse_time_of_day(at).map_err(|source| ConfigError::StartTime {
                name: self.name.clone(),
                source,
            })?;
        }
        if self.mode == JobMode::Timer && self.delay_on_error_secs.is_some() {
            return Err(self.invalid("timer jobs do not retry; remove delay_on_error_secs"));
        }
        Ok(())
    }

    /// Delay before the first run, resolving `at` against the local clock.
    pub fn initial_delay(&self) -> Result<Option<Duration>, ConfigError> {
        match (&self.at, self.due_secs) {
            (Some(at), _) => due_time::duration_from_now(at)
                .map(Some)
                .map_err(|source| ConfigError::StartTime {
                    name: self.name.clone(),
                    source,
                }),
            (None, Some(secs)) => Ok(Some(Duration::from_secs(secs))),
            (None, None) => Ok(None),
        }
    }

    pub fn period(&self) -> Option<Duration> {
        self.period_secs.map(Duration::from_secs)
    }

    pub fn delay_on_error(&self) -> Option<Duration> {
        self.delay_on_error_secs.map(Duration::from_secs)
    }

    /// Timer timing for [`JobMode::Timer`] jobs; unset fields keep the timer defaults.
    pub fn timer_config(&self, initial_delay: Option<Duration>) -> TimerConfig {
        let defaults = TimerConfig::default();
        TimerConfig {
            period: self.period().unwrap_or(defaults.period),
            due_time: initial_delay.unwrap_or(defaults.due_time),
        }
    }
}

/// The jobs file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsFile {
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

impl JobsFile {
    /// Read, parse and validate a jobs file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: Self = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        for job in &file.jobs {
            job.validate()?;
        }
        Ok(file)
    }
}

/// Configuration for the daemon.
pub struct DaemonConfig {
    /// Wait between scheduler ticks.
    pub tick_interval: Duration,
    pub jobs: Vec<JobDefinition>,
}

impl DaemonConfig {
    pub fn load(jobs_path: &Path, tick_secs: u64) -> Result<Self, ConfigError> {
        let file = JobsFile::load(jobs_path)?;
        Ok(Self {
            tick_interval: Duration::from_secs(tick_secs),
            jobs: file.jobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn parse(raw: &str) -> Result<JobsFile, ConfigError> {
        JobsFile::parse(raw, Path::new("jobs.json"))
    }

    fn definition(name: &str) -> JobDefinition {
        JobDefinition {
            name: name.to_string(),
            command: "true".to_string(),
            args: vec![],
            period_secs: None,
            due_secs: None,
            at: None,
            delay_on_error_secs: None,
            mode: JobMode::Scheduled,
        }
    }

    #[test]
    fn parses_minimal_and_full_definitions() {
        let file = parse(
            r#"{
                "jobs": [
                    { "name": "cleanup", "command": "rm", "args": ["-rf", "/tmp/x"] },
                    {
                        "name": "report",
                        "command": "make",
                        "period_secs": 3600,
                        "at": "03:30",
                        "delay_on_error_secs": 60
                    },
                    { "name": "poll", "command": "curl", "period_secs": 30, "mode": "timer" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(file.jobs.len(), 3);
        assert_eq!(file.jobs[0].args, vec!["-rf", "/tmp/x"]);
        assert_eq!(file.jobs[0].mode, JobMode::Scheduled);
        assert_eq!(file.jobs[1].at.as_deref(), Some("03:30"));
        assert_eq!(file.jobs[1].delay_on_error(), Some(Duration::from_secs(60)));
        assert_eq!(file.jobs[2].mode, JobMode::Timer);
    }

    #[test]
    fn empty_file_has_no_jobs() {
        assert_eq!(parse("{}").unwrap(), JobsFile::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse(r#"{ "jobs": [ { "name": "a", "command": "b", "cron": "* * *" } ] }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn validation_catches_contradictions() {
        let mut both = definition("both");
        both.at = Some("01:00".into());
        both.due_secs = Some(5);

        let mut zero = definition("zero");
        zero.period_secs = Some(0);

        let mut timer_retry = definition("timer");
        timer_retry.mode = JobMode::Timer;
        timer_retry.delay_on_error_secs = Some(5);

        let mut blank = definition("blank");
        blank.command = "  ".into();

        for def in [both, zero, timer_retry, blank, definition("")] {
            assert!(
                matches!(def.validate(), Err(ConfigError::Invalid { .. })),
                "{def:?} should be invalid"
            );
        }
    }

    #[test]
    fn malformed_start_time_is_reported() {
        let mut def = definition("typo");
        def.at = Some("9:00".into());
        assert!(matches!(
            def.validate(),
            Err(ConfigError::StartTime {
                source: DueTimeError::InvalidFormat(_),
                ..
            })
        ));
    }

    #[test]
    fn initial_delay_prefers_explicit_seconds() {
        let mut def = definition("d");
        assert_eq!(def.initial_delay().unwrap(), None);
        def.due_secs = Some(42);
        assert_eq!(def.initial_delay().unwrap(), Some(Duration::from_secs(42)));
    }

    #[test]
    fn timer_config_falls_back_to_defaults() {
        let mut def = definition("t");
        def.mode = JobMode::Timer;
        assert_eq!(def.timer_config(None), TimerConfig::default());

        def.period_secs = Some(5);
        let config = def.timer_config(Some(Duration::ZERO));
        assert_eq!(config.period, Duration::from_secs(5));
        assert_eq!(config.due_time, Duration::ZERO);
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "jobs": [ {{ "name": "x", "command": "echo", "period_secs": 10 }} ] }}"#
        )
        .unwrap();

        let config = DaemonConfig::load(file.path(), 3).unwrap();
        assert_eq!(config.tick_interval, Duration::from_secs(3));
        assert_eq!(config.jobs[0].period(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = JobsFile::load(Path::new("/nonexistent/tickwork/jobs.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
