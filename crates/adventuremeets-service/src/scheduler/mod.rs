//! Timer-driven scheduler that applies automatic status transitions.
//!
//! ## Summary
//! Each tick runs the predicates in [`Predicate::ORDER`] and, for every meet
//! they match, asks the status-update endpoint to move the meet to the
//! predicate's target. Only one tick runs at a time: a trigger arriving while
//! a tick is in flight is skipped, and too many consecutive skips stop the
//! scheduler with [`ServiceError::SchedulerStalled`].
//!
//! A meet is attempted at most once per tick. When it matches a later
//! predicate too, that match is counted as deferred and picked up next tick.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::error::{ServiceError, ServiceResult};
use crate::predicate::Predicate;
use crate::remote::StatusUpdater;
use crate::repository::SchedulerStore;

/// In-flight flag and skip counter owned by one scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerState {
    pub in_flight: bool,
    pub consecutive_skips: u32,
}

/// Locks the scheduler state and recovers from poisoning.
fn lock_state(state: &Mutex<SchedulerState>) -> MutexGuard<'_, SchedulerState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            state.clear_poison();
            poisoned.into_inner()
        }
    }
}

/// Clears the in-flight flag when the tick ends, however it ends.
struct InFlight {
    state: Arc<Mutex<SchedulerState>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock_state(&self.state).in_flight = false;
    }
}

enum Admission {
    Run(InFlight),
    Skip(u32),
}

/// Per-tick counts, logged once at the end of the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSummary {
    pub opened: u32,
    pub closed: u32,
    pub waitlist_closed: u32,
    pub archived: u32,
    pub deferred: u32,
    pub failed: u32,
    pub timestamp: DateTime<Utc>,
}

impl TickSummary {
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            opened: 0,
            closed: 0,
            waitlist_closed: 0,
            archived: 0,
            deferred: 0,
            failed: 0,
            timestamp,
        }
    }

    fn record(&mut self, predicate: Predicate) {
        match predicate {
            Predicate::OpenDue => self.opened += 1,
            Predicate::CloseDue => self.closed += 1,
            Predicate::WaitlistFull => self.waitlist_closed += 1,
            Predicate::EndDue => self.archived += 1,
        }
    }

    /// Successful updates across all predicates.
    #[must_use]
    pub const fn updated(&self) -> u32 {
        self.opened + self.closed + self.waitlist_closed + self.archived
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    Completed(TickSummary),
    /// A previous tick was still running.
    Skipped { consecutive_skips: u32 },
    /// The tick aborted, typically on a query error. The next tick retries.
    Failed(ServiceError),
}

pub struct MeetScheduler {
    store: Arc<dyn SchedulerStore>,
    updater: Option<Arc<dyn StatusUpdater>>,
    state: Arc<Mutex<SchedulerState>>,
    max_consecutive_skips: u32,
}

impl MeetScheduler {
    /// ## Summary
    /// Creates a scheduler. Without an `updater` it still evaluates the
    /// predicates each tick but issues no updates.
    #[must_use]
    pub fn new(
        store: Arc<dyn SchedulerStore>,
        updater: Option<Arc<dyn StatusUpdater>>,
        max_consecutive_skips: u32,
    ) -> Self {
        Self {
            store,
            updater,
            state: Arc::default(),
            max_consecutive_skips: max_consecutive_skips.max(1),
        }
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *lock_state(&self.state)
    }

    fn admit(&self) -> ServiceResult<Admission> {
        let mut state = lock_state(&self.state);
        if state.in_flight {
            state.consecutive_skips += 1;
            let consecutive_skips = state.consecutive_skips;
            if consecutive_skips >= self.max_consecutive_skips {
                tracing::error!(consecutive_skips, "Previous tick never finished; stopping scheduler");
                return Err(ServiceError::SchedulerStalled { consecutive_skips });
            }
            tracing::warn!(consecutive_skips, "Previous tick still running; skipping");
            return Ok(Admission::Skip(consecutive_skips));
        }

        state.in_flight = true;
        state.consecutive_skips = 0;
        Ok(Admission::Run(InFlight {
            state: Arc::clone(&self.state),
        }))
    }

    /// ## Summary
    /// Runs one tick now, or records a skip if one is already running.
    ///
    /// ## Errors
    /// Returns `SchedulerStalled` once the skip limit is reached. Failures
    /// inside the tick are reported as [`TickOutcome::Failed`] instead.
    pub async fn trigger(&self) -> ServiceResult<TickOutcome> {
        match self.admit()? {
            Admission::Skip(consecutive_skips) => Ok(TickOutcome::Skipped { consecutive_skips }),
            Admission::Run(guard) => Ok(self.tick(guard).await),
        }
    }

    async fn tick(&self, _guard: InFlight) -> TickOutcome {
        match self.run_tick(Utc::now()).await {
            Ok(summary) => TickOutcome::Completed(summary),
            Err(err) => {
                tracing::error!(error = %err, "Scheduler tick failed");
                TickOutcome::Failed(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn run_tick(&self, now: DateTime<Utc>) -> ServiceResult<TickSummary> {
        let mut session = self.store.acquire().await?;
        let mut summary = TickSummary::new(now);
        let mut attempted = HashSet::new();

        let updater = self.updater.as_deref();
        if updater.is_none() {
            tracing::warn!("Status API base URL or worker key not configured; no updates this tick");
        }

        for predicate in Predicate::ORDER {
            let ids = session.due(predicate, now).await?;
            let Some(updater) = updater else {
                tracing::debug!(%predicate, matched = ids.len(), "Meets due");
                continue;
            };

            for meet_id in ids {
                if !attempted.insert(meet_id) {
                    summary.deferred += 1;
                    continue;
                }
                match updater.update_status(meet_id, predicate.target()).await {
                    Ok(()) => summary.record(predicate),
                    Err(err) => {
                        summary.failed += 1;
                        tracing::warn!(%meet_id, %predicate, error = %err, "Status update failed");
                    }
                }
            }
        }
        drop(session);

        tracing::info!(
            opened = summary.opened,
            closed = summary.closed,
            waitlist_closed = summary.waitlist_closed,
            archived = summary.archived,
            deferred = summary.deferred,
            failed = summary.failed,
            timestamp = %summary.timestamp,
            "Scheduler tick complete"
        );
        Ok(summary)
    }

    /// ## Summary
    /// Triggers a tick every `period`, starting immediately, until the
    /// scheduler stalls.
    ///
    /// Ticks run as separate tasks so a slow tick never delays the timer.
    ///
    /// ## Errors
    /// Returns `SchedulerStalled` when a tick outlives the skip limit. This is
    /// the only way the loop ends.
    pub async fn run(self: Arc<Self>, period: Duration) -> ServiceResult<()> {
        tracing::info!(period_secs = period.as_secs_f64(), "Scheduler started");

        let mut ticks = tokio::time::interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut running = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    if let Admission::Run(guard) = self.admit()? {
                        let scheduler = Arc::clone(&self);
                        running.spawn(async move {
                            scheduler.tick(guard).await;
                        });
                    }
                }
                Some(joined) = running.join_next() => {
                    if let Err(err) = joined {
                        tracing::error!(error = %err, "Scheduler tick panicked");
                    }
                }
            }
        }
    }
}
