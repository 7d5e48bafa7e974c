//! Transition predicates evaluated by the scheduler.
//!
//! ## Summary
//! Each predicate drives exactly one automatic edge family of the transition
//! table: it names the source statuses it accepts and the status it moves a
//! matching meet to. The same definitions back both the SQL lookups and the
//! in-memory evaluator in [`Predicate::matches`].

use std::fmt;

use chrono::{DateTime, Utc};

use adventuremeets_core::attendee::AttendeeCounts;
use adventuremeets_core::status::MeetStatus;
use adventuremeets_db::model::meet::Meet;

use crate::accounting::Limits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// Published meets whose opening date has passed.
    OpenDue,
    /// Open meets whose closing date has passed.
    CloseDue,
    /// Open meets whose waitlist has filled up.
    WaitlistFull,
    /// Published, open or closed meets whose end time has passed.
    EndDue,
}

impl Predicate {
    /// Evaluation order within one scheduler tick.
    pub const ORDER: [Self; 4] = [Self::OpenDue, Self::CloseDue, Self::WaitlistFull, Self::EndDue];

    /// Statuses a meet must be in for this predicate to match.
    #[must_use]
    pub const fn sources(self) -> &'static [MeetStatus] {
        match self {
            Self::OpenDue => &[MeetStatus::Published],
            Self::CloseDue | Self::WaitlistFull => &[MeetStatus::Open],
            Self::EndDue => &[MeetStatus::Open, MeetStatus::Closed, MeetStatus::Published],
        }
    }

    /// Status a matching meet is moved to.
    #[must_use]
    pub const fn target(self) -> MeetStatus {
        match self {
            Self::OpenDue => MeetStatus::Open,
            Self::CloseDue | Self::WaitlistFull => MeetStatus::Closed,
            Self::EndDue => MeetStatus::Completed,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenDue => "open_due",
            Self::CloseDue => "close_due",
            Self::WaitlistFull => "waitlist_full",
            Self::EndDue => "end_due",
        }
    }

    /// ## Summary
    /// Evaluates the predicate against one meet.
    ///
    /// `counts` is only consulted by [`Predicate::WaitlistFull`].
    #[must_use]
    pub fn matches(self, meet: &MeetSchedule, counts: &AttendeeCounts, now: DateTime<Utc>) -> bool {
        if !self.sources().contains(&meet.status) {
            return false;
        }
        let reached = |at: Option<DateTime<Utc>>| at.is_some_and(|at| at <= now);

        match self {
            Self::OpenDue => reached(meet.opening_date),
            Self::CloseDue => reached(meet.closing_date),
            Self::WaitlistFull => meet.limits.waitlist_full(counts),
            Self::EndDue => reached(meet.end_time),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields of a meet the predicates look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeetSchedule {
    pub status: MeetStatus,
    pub opening_date: Option<DateTime<Utc>>,
    pub closing_date: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limits: Limits,
}

impl MeetSchedule {
    /// ## Summary
    /// Extracts the schedule of a stored meet.
    ///
    /// ## Errors
    /// Returns an error if the stored status id is unknown.
    pub fn from_meet(meet: &Meet) -> adventuremeets_core::error::CoreResult<Self> {
        Ok(Self {
            status: meet.status()?,
            opening_date: meet.opening_date,
            closing_date: meet.closing_date,
            end_time: meet.end_time,
            limits: Limits {
                capacity: meet.capacity,
                waitlist_size: meet.waitlist_size,
            },
        })
    }
}
