//! Scheduler types.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Job;
use crate::clock::add_std;
use crate::job::backoff_for;

/// Consecutive failures after which an entry is disabled for good.
pub const MAX_FAILED_ATTEMPTS: u32 = 3;

/// Stable handle to a queue entry (its position in registration order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntryId(pub(crate) usize);

impl EntryId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an entry is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Registered, never run.
    Created,
    /// Has run at least once and will run again.
    Scheduled,
    /// Permanently skipped.
    Disabled,
}

/// A registered job and its scheduling state.
pub(crate) struct QueueEntry {
    pub(crate) id: EntryId,
    pub(crate) handler: Arc<dyn Job>,
    /// When this entry is next eligible to run.
    pub(crate) next_execution_time: DateTime<Utc>,
    /// Set on one-shot success or on hitting the failure limit.
    pub(crate) executed: bool,
    /// Consecutive failures (resets on success).
    pub(crate) failed_attempts: u32,
    pub(crate) last_run: Option<DateTime<Utc>>,
    pub(crate) last_error: Option<String>,
}

impl QueueEntry {
    pub(crate) fn new(id: EntryId, handler: Arc<dyn Job>, now: DateTime<Utc>) -> Self {
        let first_run = match handler.due_time() {
            Some(delay) => add_std(now, delay),
            None => now,
        };
        Self {
            id,
            handler,
            next_execution_time: first_run,
            executed: false,
            failed_attempts: 0,
            last_run: None,
            last_error: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.handler.name()
    }

    /// Check if this entry may be selected at `now`.
    pub(crate) fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.executed && self.next_execution_time <= now
    }

    /// Apply a successful run.
    ///
    /// Periodic jobs advance from their previous due time, not from `now`.
    pub(crate) fn record_success(&mut self, now: DateTime<Utc>) {
        if self.executed {
            return;
        }
        self.last_run = Some(now);
        self.failed_attempts = 0;
        self.last_error = None;
        match self.handler.period() {
            Some(period) => self.next_execution_time = add_std(self.next_execution_time, period),
            None => self.executed = true,
        }
    }

    /// Apply a failed run. Returns true if the entry is now disabled.
    pub(crate) fn record_failure(&mut self, now: DateTime<Utc>, error: String) -> bool {
        if self.executed {
            return true;
        }
        self.last_run = Some(now);
        self.last_error = Some(error);
        let retry_at = add_std(now, backoff_for(self.handler.as_ref()));
        self.next_execution_time = retry_at.max(self.next_execution_time);
        self.failed_attempts += 1;
        if self.failed_attempts >= MAX_FAILED_ATTEMPTS {
            self.executed = true;
        }
        self.executed
    }

    pub(crate) fn state(&self) -> EntryState {
        if self.executed {
            EntryState::Disabled
        } else if self.last_run.is_none() {
            EntryState::Created
        } else {
            EntryState::Scheduled
        }
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            name: self.name().to_string(),
            state: self.state(),
            next_execution_time: self.next_execution_time,
            executed: self.executed,
            failed_attempts: self.failed_attempts,
            last_run: self.last_run,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only copy of a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    pub id: EntryId,
    pub name: String,
    pub state: EntryState,
    pub next_execution_time: DateTime<Utc>,
    pub executed: bool,
    pub failed_attempts: u32,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was due.
    Idle,
    /// A periodic job succeeded and was rescheduled.
    Rescheduled {
        id: EntryId,
        next_run: DateTime<Utc>,
    },
    /// A one-shot job succeeded and will not run again.
    Completed { id: EntryId },
    /// A job failed and will be retried after its backoff.
    Retrying {
        id: EntryId,
        failed_attempts: u32,
        next_run: DateTime<Utc>,
    },
    /// A job failed for the last time and is now disabled.
    Disabled { id: EntryId, failed_attempts: u32 },
}

impl TickOutcome {
    /// The entry this tick ran, if any.
    pub fn entry(&self) -> Option<EntryId> {
        match self {
            Self::Idle => None,
            Self::Rescheduled { id, .. }
            | Self::Completed { id }
            | Self::Retrying { id, .. }
            | Self::Disabled { id, .. } => Some(*id),
        }
    }
}
