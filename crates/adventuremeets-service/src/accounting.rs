//! Capacity and waitlist accounting.
//!
//! ## Summary
//! Counts are derived from attendee rows on every request and never stored,
//! so they cannot drift from concurrent attendee-status writes.

use adventuremeets_core::attendee::{AttendeeCounts, AttendeeStatus};

use crate::error::{ServiceError, ServiceResult};

/// ## Summary
/// Folds per-status totals into the display and predicate counts.
///
/// Repeated statuses are summed, so callers may pass one entry per attendee
/// (`(status, 1)`) or one per group.
#[must_use]
pub fn tally<I>(totals: I) -> AttendeeCounts
where
    I: IntoIterator<Item = (AttendeeStatus, i64)>,
{
    totals
        .into_iter()
        .fold(AttendeeCounts::default(), |mut counts, (status, n)| {
            counts.attendee_count += n;
            if status.holds_place() {
                counts.confirmed_count += n;
            }
            if status.is_waitlisted() {
                counts.waitlist_count += n;
            }
            if status.is_checked_in() {
                counts.checked_in_count += n;
            }
            counts
        })
}

/// Capacity settings of a meet. `None` and `Some(0)` both mean "no limit" for
/// capacity and "no waitlist" for the waitlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limits {
    pub capacity: Option<i32>,
    pub waitlist_size: Option<i32>,
}

impl Limits {
    /// Confirmed places available, `None` when unlimited.
    #[must_use]
    pub fn capacity(self) -> Option<i64> {
        self.capacity.filter(|c| *c > 0).map(i64::from)
    }

    /// Waitlist places, 0 when the meet has no waitlist.
    #[must_use]
    pub fn waitlist_size(self) -> i64 {
        self.waitlist_size.filter(|w| *w > 0).map_or(0, i64::from)
    }

    /// `true` once the waitlist has a positive size and is at or over it.
    #[must_use]
    pub fn waitlist_full(self, counts: &AttendeeCounts) -> bool {
        let size = self.waitlist_size();
        size > 0 && counts.waitlist_count >= size
    }
}

/// ## Summary
/// Checks that moving one attendee from `current` to `next` keeps the meet
/// within its limits.
///
/// Moves that do not add to a bounded pool (for example confirmed to
/// checked-in, or anything to rejected) always pass.
///
/// ## Errors
/// Returns `ServiceError::Conflict` when the confirmed places or the waitlist
/// are full, or when waitlisting on a meet that has no waitlist.
pub fn check_status_change(
    limits: Limits,
    counts: &AttendeeCounts,
    current: AttendeeStatus,
    next: AttendeeStatus,
) -> ServiceResult<()> {
    if next.holds_place() && !current.holds_place() {
        if let Some(capacity) = limits.capacity() {
            if counts.confirmed_count >= capacity {
                return Err(ServiceError::Conflict(format!(
                    "Meet is at capacity ({capacity} confirmed)"
                )));
            }
        }
    }

    if next.is_waitlisted() && !current.is_waitlisted() {
        let size = limits.waitlist_size();
        if size == 0 {
            return Err(ServiceError::Conflict(
                "Meet does not have a waitlist".to_string(),
            ));
        }
        if counts.waitlist_count >= size {
            return Err(ServiceError::Conflict(format!(
                "Waitlist is full ({size} waitlisted)"
            )));
        }
    }

    Ok(())
}
