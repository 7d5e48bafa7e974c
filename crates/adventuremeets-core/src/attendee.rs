use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status of a single signup. A new signup is `Pending` until the organizer acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendeeStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
    Waitlisted,
    CheckedIn,
    Attended,
}

impl AttendeeStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Rejected,
        Self::Waitlisted,
        Self::CheckedIn,
        Self::Attended,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Waitlisted => "waitlisted",
            Self::CheckedIn => "checked-in",
            Self::Attended => "attended",
        }
    }

    /// Holds a confirmed place: confirmed, checked in, or attended.
    #[must_use]
    pub const fn holds_place(self) -> bool {
        matches!(self, Self::Confirmed | Self::CheckedIn | Self::Attended)
    }

    #[must_use]
    pub const fn is_checked_in(self) -> bool {
        matches!(self, Self::CheckedIn | Self::Attended)
    }

    #[must_use]
    pub const fn is_waitlisted(self) -> bool {
        matches!(self, Self::Waitlisted)
    }
}

impl FromStr for AttendeeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownAttendeeStatus(s.to_string()))
    }
}

impl fmt::Display for AttendeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live per-meet attendee counts, always derived from attendee rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeCounts {
    pub attendee_count: i64,
    pub confirmed_count: i64,
    pub waitlist_count: i64,
    pub checked_in_count: i64,
}
