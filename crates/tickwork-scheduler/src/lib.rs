//! In-process job scheduler for tickwork.
//!
//! This crate provides:
//! - A [`Registry`] of named jobs with one-shot or periodic cadence
//! - A tick-driven [`Scheduler`] loop that runs one due job per tick
//! - Fixed backoff after failures, disabling a job after three in a row
//! - A [`PeriodicTimer`] for single jobs that need no retry bookkeeping
//! - [`due_time`] helpers for "run at HH:mm" initial delays

pub mod clock;
pub mod due_time;
mod error;
mod job;
mod registry;
mod scheduler;
mod service;
mod timer;
mod types;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use error::{BoxError, DueTimeError, JobError, SchedulerError, TimerError};
pub use job::{DEFAULT_DELAY_ON_ERROR, Job};
pub use registry::Registry;
pub use scheduler::{DEFAULT_TICK_INTERVAL, Scheduler, SchedulerHandle};
pub use service::BackgroundService;
pub use timer::{
    DEFAULT_TIMER_DUE_TIME, DEFAULT_TIMER_PERIOD, PeriodicTimer, TimerConfig, TimerHandle,
    TimerTask,
};
pub use types::{EntryId, EntrySnapshot, EntryState, MAX_FAILED_ATTEMPTS, TickOutcome};
