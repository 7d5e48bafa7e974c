//! Storage seams used by the services and the scheduler.
//!
//! ## Summary
//! [`MeetRepository`] covers the request path (one call per operation, each
//! checking out its own connection). [`SchedulerStore`] hands the scheduler a
//! [`DueMeetSession`] that holds one connection for a whole tick and returns it
//! to the pool when dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use adventuremeets_core::attendee::{AttendeeCounts, AttendeeStatus};
use adventuremeets_core::status::MeetStatus;
use adventuremeets_core::util::contact;
use adventuremeets_db::model::attendee::Attendee;
use adventuremeets_db::model::meet::{Meet, MeetStatusRow};

use crate::error::{ServiceError, ServiceResult};
use crate::meet::MeetPatch;
use crate::predicate::Predicate;

pub mod pg;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

/// Normalized email and phone used to compare signups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactKeys {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactKeys {
    #[must_use]
    pub fn from_contact(email: Option<&str>, phone: Option<&str>) -> Self {
        Self {
            email: email.and_then(contact::normalize_email),
            phone: phone.and_then(contact::normalize_phone),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none()
    }

    /// `true` when either key is present on both sides and equal.
    #[must_use]
    pub fn overlaps(&self, email_key: Option<&str>, phone_key: Option<&str>) -> bool {
        contact::same_person(
            (self.email.as_deref(), self.phone.as_deref()),
            (email_key, phone_key),
        )
    }
}

pub(crate) fn signups_closed(status: MeetStatus) -> ServiceError {
    ServiceError::Conflict(format!("Meet is not accepting signups (status {status})"))
}

pub(crate) fn already_signed_up(attendee_id: Uuid) -> ServiceError {
    ServiceError::Conflict(format!("Already signed up as attendee {attendee_id}"))
}

/// A validated meet ready to be stored as a draft.
#[derive(Debug, Clone)]
pub struct MeetDraft {
    pub name: String,
    pub organizer_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub share_code: String,
    pub details: MeetPatch,
}

/// One page of a meet listing.
#[derive(Debug, Clone, Default)]
pub struct MeetQuery {
    /// Only these statuses; `None` for all.
    pub statuses: Option<Vec<MeetStatus>>,
    /// Only meets managed by this organizer or their organizations.
    pub managed_by: Option<(Uuid, Vec<Uuid>)>,
    pub limit: i64,
    pub offset: i64,
}

/// A signup ready to be stored.
#[derive(Debug, Clone)]
pub struct AttendeeDraft {
    pub meet_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub guests: Option<i32>,
    pub keys: ContactKeys,
    pub status: AttendeeStatus,
}

#[async_trait]
pub trait MeetRepository: Send + Sync {
    async fn find_meet(&self, meet_id: Uuid) -> ServiceResult<Option<Meet>>;

    /// ## Summary
    /// Writes `status`. With `expected` set, the write only happens while the
    /// stored status still equals it.
    ///
    /// ## Returns
    /// `None` when the meet does not exist or no longer has the expected status.
    async fn set_status(
        &self,
        meet_id: Uuid,
        status: MeetStatus,
        expected: Option<MeetStatus>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Meet>>;

    /// ## Errors
    /// Returns `ServiceError::Conflict` if the share code is already taken.
    async fn create_meet(&self, draft: MeetDraft) -> ServiceResult<Meet>;

    /// ## Summary
    /// Applies `patch` after [`crate::meet::check_meet_update`] accepts it
    /// against the meet's current status and counts, both read under the same
    /// lock as the write.
    ///
    /// ## Returns
    /// `None` when the meet does not exist.
    async fn update_meet(
        &self,
        meet_id: Uuid,
        patch: &MeetPatch,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Meet>>;

    /// One page of meets ordered by start time, and the total matching count.
    async fn list_meets(&self, query: &MeetQuery) -> ServiceResult<(Vec<Meet>, i64)>;

    /// Per-meet, per-status attendee totals for the given meets.
    async fn status_totals(
        &self,
        meet_ids: &[Uuid],
    ) -> ServiceResult<Vec<(Uuid, AttendeeStatus, i64)>>;

    /// Deletes the meet if it is still a draft; `false` otherwise.
    async fn delete_draft(&self, meet_id: Uuid) -> ServiceResult<bool>;

    async fn list_statuses(&self) -> ServiceResult<Vec<MeetStatusRow>>;

    async fn attendee_counts(&self, meet_id: Uuid) -> ServiceResult<AttendeeCounts>;

    async fn find_attendee_by_contact(
        &self,
        meet_id: Uuid,
        keys: &ContactKeys,
    ) -> ServiceResult<Option<Attendee>>;

    /// ## Summary
    /// Stores a signup. The meet's status and the contact keys are checked in
    /// the same unit as the insert, with the meet row held against status
    /// changes until it is stored.
    ///
    /// ## Errors
    /// - `ServiceError::NotFound` when the meet does not exist.
    /// - `ServiceError::Conflict` when the meet is not accepting signups, or
    ///   another signup of the meet already holds one of the contact keys.
    async fn insert_attendee(&self, draft: AttendeeDraft) -> ServiceResult<Attendee>;

    async fn find_attendee(&self, meet_id: Uuid, attendee_id: Uuid)
    -> ServiceResult<Option<Attendee>>;

    /// A meet's attendees in signup order; with `accepted_only`, just those
    /// holding a place.
    async fn list_attendees(&self, meet_id: Uuid, accepted_only: bool) -> ServiceResult<Vec<Attendee>>;

    /// `false` when no such attendee belongs to the meet.
    async fn delete_attendee(&self, meet_id: Uuid, attendee_id: Uuid) -> ServiceResult<bool>;

    /// ## Summary
    /// Changes an attendee's status after checking the meet's limits, with the
    /// meet serialized against other attendee changes for the duration.
    ///
    /// ## Errors
    /// Returns `ServiceError::Conflict` when the change would exceed the
    /// capacity or the waitlist.
    async fn update_attendee_status(
        &self,
        meet_id: Uuid,
        attendee_id: Uuid,
        status: AttendeeStatus,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Attendee>>;
}

/// Source of per-tick sessions for the scheduler.
#[async_trait]
pub trait SchedulerStore: Send + Sync {
    /// ## Errors
    /// Returns an error if no connection can be checked out.
    async fn acquire(&self) -> ServiceResult<Box<dyn DueMeetSession>>;
}

/// One tick's hold on the store. Dropping it releases the connection.
#[async_trait]
pub trait DueMeetSession: Send {
    /// Ids of meets matching `predicate` at `now`, ordered by id.
    async fn due(&mut self, predicate: Predicate, now: DateTime<Utc>) -> ServiceResult<Vec<Uuid>>;
}
