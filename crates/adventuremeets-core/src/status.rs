//! Meet lifecycle states and the table of allowed transitions.
//!
//! ## Summary
//! Every status change in the system, whether issued by the scheduler or by an
//! organizer, is checked against [`TRANSITIONS`]. Predicates name the edge they
//! drive, and the status endpoint consults the same table in strict mode, so the
//! automatic and manual paths read from one place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Lifecycle state of a meet.
///
/// Maps to `meets.status_id` and the seeded `meet_statuses` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum MeetStatus {
    Draft = 1,
    Published = 2,
    Open = 3,
    Closed = 4,
    Cancelled = 5,
    Postponed = 6,
    Completed = 7,
}

impl MeetStatus {
    pub const ALL: [Self; 7] = [
        Self::Draft,
        Self::Published,
        Self::Open,
        Self::Closed,
        Self::Cancelled,
        Self::Postponed,
        Self::Completed,
    ];

    /// Returns the numeric id stored in the database.
    #[must_use]
    pub const fn id(self) -> i32 {
        self as i32
    }

    /// Returns the display name, matching `meet_statuses.name`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Published => "Published",
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::Cancelled => "Cancelled",
            Self::Postponed => "Postponed",
            Self::Completed => "Completed",
        }
    }

    /// Cancelled and Completed have no outgoing edges.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Only drafts may be deleted outright.
    #[must_use]
    pub const fn is_deletable(self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Public signups are accepted only while applications are open.
    #[must_use]
    pub const fn accepts_signups(self) -> bool {
        matches!(self, Self::Open)
    }

    /// ## Summary
    /// Looks up the edge from `self` to `to`, if the table has one.
    #[must_use]
    pub fn transition_to(self, to: Self) -> Option<&'static Transition> {
        TRANSITIONS.iter().find(|t| t.from == self && t.to == to)
    }

    /// ## Summary
    /// Returns `true` when `to` is reachable from `self` by the given trigger.
    ///
    /// Setting a meet to the status it already has is always accepted; the
    /// scheduler may re-send an update whose first response was lost.
    #[must_use]
    pub fn can_transition_to(self, to: Self, trigger: Trigger) -> bool {
        if self == to {
            return true;
        }
        self.transition_to(to)
            .is_some_and(|transition| transition.allows(trigger))
    }

    /// All edges leaving this status.
    pub fn successors(self) -> impl Iterator<Item = &'static Transition> {
        TRANSITIONS.iter().filter(move |t| t.from == self)
    }
}

impl TryFrom<i32> for MeetStatus {
    type Error = CoreError;

    fn try_from(value: i32) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.id() == value)
            .ok_or(CoreError::UnknownStatus(value))
    }
}

impl From<MeetStatus> for i32 {
    fn from(status: MeetStatus) -> Self {
        status.id()
    }
}

impl fmt::Display for MeetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is allowed to drive an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Driven by the scheduler when a time or capacity predicate holds.
    Automatic,
    /// Driven by an organizer action.
    Manual,
}

/// A directed edge of the lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: MeetStatus,
    pub to: MeetStatus,
    pub triggers: &'static [Trigger],
}

impl Transition {
    #[must_use]
    pub fn allows(&self, trigger: Trigger) -> bool {
        self.triggers.contains(&trigger)
    }
}

use MeetStatus::{Cancelled, Closed, Completed, Draft, Open, Postponed, Published};

const MANUAL: &[Trigger] = &[Trigger::Manual];
const AUTOMATIC: &[Trigger] = &[Trigger::Automatic];
const EITHER: &[Trigger] = &[Trigger::Automatic, Trigger::Manual];

const fn edge(from: MeetStatus, to: MeetStatus, triggers: &'static [Trigger]) -> Transition {
    Transition { from, to, triggers }
}

/// Every allowed status change. Anything not listed here is not a valid edge.
pub const TRANSITIONS: &[Transition] = &[
    edge(Draft, Published, MANUAL),
    edge(Published, Open, EITHER),
    edge(Open, Closed, EITHER),
    edge(Closed, Open, MANUAL),
    edge(Published, Postponed, MANUAL),
    edge(Open, Postponed, MANUAL),
    edge(Closed, Postponed, MANUAL),
    edge(Postponed, Open, MANUAL),
    edge(Postponed, Published, MANUAL),
    edge(Published, Cancelled, MANUAL),
    edge(Open, Cancelled, MANUAL),
    edge(Closed, Cancelled, MANUAL),
    edge(Postponed, Cancelled, MANUAL),
    edge(Published, Completed, AUTOMATIC),
    edge(Open, Completed, AUTOMATIC),
    edge(Closed, Completed, AUTOMATIC),
];
