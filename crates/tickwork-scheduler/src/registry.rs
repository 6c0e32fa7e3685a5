//! The set of registered jobs and the per-tick selection pass.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::types::{EntryId, EntrySnapshot, QueueEntry, TickOutcome};
use crate::{Job, JobError};

/// Holds every queue entry ever registered.
///
/// Entries are never removed, so an [`EntryId`] stays valid for the
/// registry's lifetime. Registration may happen while a tick is running;
/// the entry lock is never held across a job run. Ticks are serialized, so
/// at most one job body runs at a time even if several callers tick.
pub struct Registry {
    entries: RwLock<Vec<QueueEntry>>,
    run_guard: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    /// Create a registry on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create a registry on a custom clock.
    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            run_guard: Mutex::new(()),
            clock: Arc::new(clock),
        }
    }

    /// Register a job. Always succeeds; equivalent jobs are not deduplicated.
    pub async fn add_job(&self, job: impl Job + 'static) -> EntryId {
        self.add_shared(Arc::new(job)).await
    }

    /// Register an already shared job.
    pub async fn add_shared(&self, job: Arc<dyn Job>) -> EntryId {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let id = EntryId(entries.len());
        let entry = QueueEntry::new(id, job, now);
        info!(
            job = %entry.name(),
            entry = %id,
            first_run = %entry.next_execution_time,
            queue_size = entries.len() + 1,
            "job scheduled"
        );
        entries.push(entry);
        id
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Copy of every entry, in registration order.
    pub async fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.entries
            .read()
            .await
            .iter()
            .map(QueueEntry::snapshot)
            .collect()
    }

    /// Copy of a single entry.
    pub async fn entry(&self, id: EntryId) -> Option<EntrySnapshot> {
        self.entries.read().await.get(id.0).map(QueueEntry::snapshot)
    }

    /// Earliest next execution time among entries that are not disabled.
    pub async fn next_due(&self) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| !e.executed)
            .map(|e| e.next_execution_time)
            .min()
    }

    /// Run at most one due job and apply its outcome.
    ///
    /// The earliest due entry wins; ties go to the entry registered first.
    /// A concurrent call waits for the running pass to finish first.
    pub async fn tick(&self) -> TickOutcome {
        let _running = self.run_guard.lock().await;
        let now = self.clock.now();
        let selected = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|e| e.is_due(now))
                .min_by_key(|e| (e.next_execution_time, e.id))
                .map(|e| (e.id, Arc::clone(&e.handler)))
        };

        match selected {
            Some((id, job)) => self.execute(id, job).await,
            None => TickOutcome::Idle,
        }
    }

    #[tracing::instrument(skip(self, job), fields(job = %job.name(), entry = %id))]
    async fn execute(&self, id: EntryId, job: Arc<dyn Job>) -> TickOutcome {
        info!("running job");

        let result = AssertUnwindSafe(job.run())
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(payload.as_ref()))));

        let finished = self.clock.now();
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(id.0) else {
            return TickOutcome::Idle;
        };

        match result {
            Ok(()) => {
                entry.record_success(finished);
                if entry.executed {
                    info!("one-shot job completed");
                    TickOutcome::Completed { id }
                } else {
                    info!(
                        next_run = %entry.next_execution_time,
                        "periodic job succeeded, rescheduled"
                    );
                    TickOutcome::Rescheduled {
                        id,
                        next_run: entry.next_execution_time,
                    }
                }
            }
            Err(e) => {
                let disabled = entry.record_failure(finished, e.to_string());
                if disabled {
                    error!(
                        failed_attempts = entry.failed_attempts,
                        error = %e,
                        "job failed too many times in a row, disabled"
                    );
                    TickOutcome::Disabled {
                        id,
                        failed_attempts: entry.failed_attempts,
                    }
                } else {
                    warn!(
                        failed_attempts = entry.failed_attempts,
                        next_run = %entry.next_execution_time,
                        error = %e,
                        "job failed, scheduled retry"
                    );
                    TickOutcome::Retrying {
                        id,
                        failed_attempts: entry.failed_attempts,
                        next_run: entry.next_execution_time,
                    }
                }
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
