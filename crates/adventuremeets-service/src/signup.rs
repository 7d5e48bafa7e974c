//! Public signups and the organizer's view of a meet's attendees.

use std::str::FromStr;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use adventuremeets_core::attendee::AttendeeStatus;
use adventuremeets_db::model::attendee::AttendeeView;

use crate::error::{ServiceError, ServiceResult};
use crate::meet::{Actor, managed_meet};
use crate::repository::{self, AttendeeDraft, ContactKeys, MeetRepository};

/// Signup form submitted by the public.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub guests: Option<i32>,
}

/// Which attendees a roster listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttendeeFilter {
    #[default]
    All,
    /// Only attendees holding a place: confirmed, checked in or attended.
    Accepted,
}

impl FromStr for AttendeeFilter {
    type Err = ServiceError;

    fn from_str(s: &str) -> ServiceResult<Self> {
        match s {
            "all" => Ok(Self::All),
            "accepted" => Ok(Self::Accepted),
            other => Err(ServiceError::ValidationError(format!(
                "Unknown attendee filter {other:?}"
            ))),
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// ## Summary
/// Registers a signup for an open meet. New attendees start as pending.
///
/// ## Errors
/// - `ValidationError` when neither email nor phone is given, or guests is negative.
/// - `NotFound` for an unknown meet.
/// - `Conflict` when the meet is not open, or the email or phone is already
///   signed up (the message carries the existing attendee id).
#[tracing::instrument(skip(repo, request))]
pub async fn sign_up(
    repo: &dyn MeetRepository,
    meet_id: Uuid,
    request: SignupRequest,
) -> ServiceResult<AttendeeView> {
    let email = trimmed(request.email);
    let phone = trimmed(request.phone);
    let keys = ContactKeys::from_contact(email.as_deref(), phone.as_deref());
    if keys.is_empty() {
        return Err(ServiceError::ValidationError(
            "Either email or phone is required".to_string(),
        ));
    }
    if request.guests.is_some_and(|g| g < 0) {
        return Err(ServiceError::ValidationError(
            "Guests cannot be negative".to_string(),
        ));
    }

    let meet = repo
        .find_meet(meet_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Meet {meet_id}")))?;
    let status = meet.status()?;
    if !status.accepts_signups() {
        return Err(repository::signups_closed(status));
    }

    // The store re-checks the status and the contact keys under the meet lock.
    let attendee = repo
        .insert_attendee(AttendeeDraft {
            meet_id,
            user_id: request.user_id,
            name: trimmed(request.name),
            email,
            phone,
            guests: request.guests,
            keys,
            status: AttendeeStatus::Pending,
        })
        .await?;

    tracing::info!(%meet_id, attendee_id = %attendee.id, "Attendee signed up");
    Ok(attendee.into())
}

/// ## Summary
/// Finds the signup of a meet matching the email or phone.
///
/// ## Errors
/// Returns `ValidationError` when neither value is given.
pub async fn lookup_by_contact(
    repo: &dyn MeetRepository,
    meet_id: Uuid,
    email: Option<&str>,
    phone: Option<&str>,
) -> ServiceResult<Option<AttendeeView>> {
    let keys = ContactKeys::from_contact(email, phone);
    if keys.is_empty() {
        return Err(ServiceError::ValidationError(
            "Either email or phone is required".to_string(),
        ));
    }
    Ok(repo
        .find_attendee_by_contact(meet_id, &keys)
        .await?
        .map(AttendeeView::from))
}

/// ## Summary
/// Lists a managed meet's attendees in signup order.
///
/// ## Errors
/// Returns `NotFound` for an unknown or unmanaged meet.
pub async fn list_attendees(
    repo: &dyn MeetRepository,
    meet_id: Uuid,
    actor: &Actor,
    filter: AttendeeFilter,
) -> ServiceResult<Vec<AttendeeView>> {
    managed_meet(repo, meet_id, actor).await?;
    let attendees = repo
        .list_attendees(meet_id, filter == AttendeeFilter::Accepted)
        .await?;
    Ok(attendees.into_iter().map(AttendeeView::from).collect())
}

/// ## Summary
/// Removes a signup from a managed meet. The freed place is reflected in the
/// next count.
///
/// ## Errors
/// Returns `NotFound` for an unknown or unmanaged meet, or an unknown attendee.
#[tracing::instrument(skip(repo))]
pub async fn remove_attendee(
    repo: &dyn MeetRepository,
    meet_id: Uuid,
    attendee_id: Uuid,
    actor: &Actor,
) -> ServiceResult<()> {
    managed_meet(repo, meet_id, actor).await?;
    if !repo.delete_attendee(meet_id, attendee_id).await? {
        return Err(ServiceError::NotFound(format!("Attendee {attendee_id}")));
    }
    tracing::info!(%meet_id, %attendee_id, "Attendee removed");
    Ok(())
}

/// ## Summary
/// Changes an attendee's status, enforcing the meet's capacity and waitlist.
///
/// ## Errors
/// - `NotFound` for an unknown or unmanaged meet, or an unknown attendee.
/// - `Conflict` when the meet's limits refuse the change.
#[tracing::instrument(skip(repo))]
pub async fn change_attendee_status(
    repo: &dyn MeetRepository,
    meet_id: Uuid,
    attendee_id: Uuid,
    status: AttendeeStatus,
    actor: &Actor,
) -> ServiceResult<AttendeeView> {
    managed_meet(repo, meet_id, actor).await?;

    let attendee = repo
        .update_attendee_status(meet_id, attendee_id, status, Utc::now())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Attendee {attendee_id}")))?;

    tracing::info!(%meet_id, %attendee_id, %status, "Attendee status changed");
    Ok(attendee.into())
}
