//! Meet service: organizer CRUD and the single write path for status changes.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adventuremeets_core::attendee::{AttendeeCounts, AttendeeStatus};
use adventuremeets_core::config::TransitionGuard;
use adventuremeets_core::status::{MeetStatus, Trigger};
use adventuremeets_db::model::meet::{Meet, MeetStatusRow};

use crate::accounting;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{MeetDraft, MeetQuery, MeetRepository};

const SHARE_CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
pub const SHARE_CODE_LEN: usize = 12;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Who is asking for a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The scheduler, authenticated with the worker credential.
    Worker,
    /// An organizer authenticated upstream.
    Organizer {
        user_id: Uuid,
        organization_ids: Vec<Uuid>,
    },
}

impl Actor {
    #[must_use]
    pub const fn trigger(&self) -> Trigger {
        match self {
            Self::Worker => Trigger::Automatic,
            Self::Organizer { .. } => Trigger::Manual,
        }
    }

    /// The worker manages every meet; an organizer manages meets they own or
    /// that belong to one of their organizations.
    #[must_use]
    pub fn can_manage(&self, meet: &Meet) -> bool {
        match self {
            Self::Worker => true,
            Self::Organizer {
                user_id,
                organization_ids,
            } => {
                meet.organizer_id == *user_id
                    || meet
                        .organization_id
                        .is_some_and(|org| organization_ids.contains(&org))
            }
        }
    }
}

/// A meet together with its live attendee counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetWithCounts {
    #[serde(flatten)]
    pub meet: Meet,
    #[serde(flatten)]
    pub counts: AttendeeCounts,
}

/// Editable meet fields. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub opening_date: Option<DateTime<Utc>>,
    pub closing_date: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub confirm_date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub waitlist_size: Option<i32>,
    /// Only accepted on the status endpoint; present here to refuse it.
    pub status_id: Option<i32>,
}

impl MeetPatch {
    /// ## Errors
    /// Returns `ValidationError` for a blank name, a negative limit, or a
    /// status id.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.status_id.is_some() {
            return Err(ServiceError::ValidationError(
                "Status is changed through the status endpoint".to_string(),
            ));
        }
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ServiceError::ValidationError("Name cannot be blank".to_string()));
        }
        if self.capacity.is_some_and(|c| c < 0) || self.waitlist_size.is_some_and(|w| w < 0) {
            return Err(ServiceError::ValidationError(
                "Capacity and waitlist size cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Copies every present field onto `meet`.
    pub fn apply(&self, meet: &mut Meet) {
        if let Some(name) = &self.name {
            name.trim().clone_into(&mut meet.name);
        }
        if self.description.is_some() {
            meet.description.clone_from(&self.description);
        }
        if self.location.is_some() {
            meet.location.clone_from(&self.location);
        }
        for (value, field) in [
            (self.start_time, &mut meet.start_time),
            (self.end_time, &mut meet.end_time),
            (self.opening_date, &mut meet.opening_date),
            (self.closing_date, &mut meet.closing_date),
            (self.scheduled_date, &mut meet.scheduled_date),
            (self.confirm_date, &mut meet.confirm_date),
        ] {
            if value.is_some() {
                *field = value;
            }
        }
        if self.capacity.is_some() {
            meet.capacity = self.capacity;
        }
        if self.waitlist_size.is_some() {
            meet.waitlist_size = self.waitlist_size;
        }
    }
}

fn check_date_order(meet: &Meet) -> ServiceResult<()> {
    let out_of_order = |first: Option<DateTime<Utc>>, second: Option<DateTime<Utc>>| {
        matches!((first, second), (Some(a), Some(b)) if a > b)
    };
    if out_of_order(meet.start_time, meet.end_time) {
        return Err(ServiceError::ValidationError(
            "End time is before start time".to_string(),
        ));
    }
    if out_of_order(meet.opening_date, meet.closing_date) {
        return Err(ServiceError::ValidationError(
            "Closing date is before opening date".to_string(),
        ));
    }
    Ok(())
}

/// ## Summary
/// Decides whether `patch` may be applied to `current`.
///
/// Drafts take any valid change. Once published, a meet stays editable until
/// it is cancelled or completed, but its capacity and waitlist cannot drop
/// below the places already taken.
///
/// ## Errors
/// - `Conflict` for a cancelled or completed meet, or limits below `counts`.
/// - `ValidationError` when the result would have its dates out of order.
pub fn check_meet_update(current: &Meet, counts: &AttendeeCounts, patch: &MeetPatch) -> ServiceResult<()> {
    let status = current.status()?;
    if status.is_terminal() {
        return Err(ServiceError::Conflict(format!(
            "Meet is {status} and can no longer be edited"
        )));
    }
    if status != MeetStatus::Draft {
        if patch
            .capacity
            .is_some_and(|capacity| i64::from(capacity) < counts.confirmed_count)
        {
            return Err(ServiceError::Conflict(format!(
                "Capacity cannot drop below {} confirmed attendees",
                counts.confirmed_count
            )));
        }
        if patch
            .waitlist_size
            .is_some_and(|size| i64::from(size) < counts.waitlist_count)
        {
            return Err(ServiceError::Conflict(format!(
                "Waitlist size cannot drop below {} waitlisted attendees",
                counts.waitlist_count
            )));
        }
    }

    let mut merged = current.clone();
    patch.apply(&mut merged);
    check_date_order(&merged)
}

/// New meet form. The creator becomes the organizer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeetRequest {
    pub organization_id: Option<Uuid>,
    #[serde(flatten)]
    pub details: MeetPatch,
}

/// Status groups offered by the meet listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeetView {
    #[default]
    All,
    /// Meets still being planned or run: draft, published, open, postponed.
    Plan,
    /// Meets that are over: closed, cancelled, completed.
    Reports,
}

impl MeetView {
    #[must_use]
    pub const fn includes(self, status: MeetStatus) -> bool {
        match self {
            Self::All => true,
            Self::Plan => matches!(
                status,
                MeetStatus::Draft | MeetStatus::Published | MeetStatus::Open | MeetStatus::Postponed
            ),
            Self::Reports => matches!(
                status,
                MeetStatus::Closed | MeetStatus::Cancelled | MeetStatus::Completed
            ),
        }
    }

    fn statuses(self) -> Option<Vec<MeetStatus>> {
        (self != Self::All).then(|| {
            MeetStatus::ALL
                .into_iter()
                .filter(|status| self.includes(*status))
                .collect()
        })
    }
}

impl FromStr for MeetView {
    type Err = ServiceError;

    fn from_str(s: &str) -> ServiceResult<Self> {
        match s {
            "all" => Ok(Self::All),
            "plan" => Ok(Self::Plan),
            "reports" => Ok(Self::Reports),
            other => Err(ServiceError::ValidationError(format!("Unknown view {other:?}"))),
        }
    }
}

/// One page of meets with their counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetPage {
    pub items: Vec<MeetWithCounts>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Random share code drawn from `[A-Za-z0-9]`.
#[must_use]
pub fn generate_share_code() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    // Bytes 6 and 8 carry the version and variant bits.
    bytes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 6 && *i != 8)
        .take(SHARE_CODE_LEN)
        .map(|(_, b)| char::from(SHARE_CODE_CHARS[usize::from(*b) % SHARE_CODE_CHARS.len()]))
        .collect()
}

/// Loads a meet the actor may manage. Meets outside the actor's reach are
/// reported as missing.
pub(crate) async fn managed_meet(
    repo: &dyn MeetRepository,
    meet_id: Uuid,
    actor: &Actor,
) -> ServiceResult<Meet> {
    repo.find_meet(meet_id)
        .await?
        .filter(|meet| actor.can_manage(meet))
        .ok_or_else(|| ServiceError::NotFound(format!("Meet {meet_id}")))
}

/// ## Summary
/// Sets a meet's status on behalf of `actor`.
///
/// With [`TransitionGuard::Permissive`] any known status is written as-is. With
/// [`TransitionGuard::Strict`] the edge must exist in the transition table and
/// accept the actor's trigger; re-sending the current status always passes.
///
/// ## Errors
/// - `ValidationError` for an unknown status id.
/// - `NotFound` when the meet does not exist or the actor may not manage it.
/// - `InvalidTransition` when the strict guard refuses the edge.
/// - `Conflict` when, under the strict guard, the status changed between the
///   check and the write.
#[tracing::instrument(skip(repo))]
pub async fn change_status(
    repo: &dyn MeetRepository,
    meet_id: Uuid,
    status_id: i32,
    actor: &Actor,
    guard: TransitionGuard,
) -> ServiceResult<Meet> {
    let target = MeetStatus::try_from(status_id)
        .map_err(|_err| ServiceError::ValidationError(format!("Unknown status id {status_id}")))?;

    let meet = managed_meet(repo, meet_id, actor).await?;
    let current = meet.status()?;

    if guard == TransitionGuard::Strict && !current.can_transition_to(target, actor.trigger()) {
        tracing::warn!(%meet_id, from = %current, to = %target, "Refusing status change");
        return Err(ServiceError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    let expected = (guard == TransitionGuard::Strict).then_some(current);
    let Some(updated) = repo.set_status(meet_id, target, expected, Utc::now()).await? else {
        return Err(match repo.find_meet(meet_id).await? {
            Some(changed) => {
                tracing::warn!(%meet_id, from = %current, to = %target, "Status changed during update");
                ServiceError::Conflict(format!(
                    "Meet {meet_id} changed status concurrently (now {})",
                    changed.status()?
                ))
            }
            None => ServiceError::NotFound(format!("Meet {meet_id}")),
        });
    };

    tracing::info!(%meet_id, from = %current, to = %target, "Meet status changed");
    Ok(updated)
}

/// ## Summary
/// Loads a meet with its counts computed from the current attendee rows.
///
/// ## Errors
/// Returns `NotFound` when the meet does not exist or the actor may not manage it.
pub async fn meet_with_counts(
    repo: &dyn MeetRepository,
    meet_id: Uuid,
    actor: &Actor,
) -> ServiceResult<MeetWithCounts> {
    let meet = managed_meet(repo, meet_id, actor).await?;
    let counts = repo.attendee_counts(meet_id).await?;
    Ok(MeetWithCounts { meet, counts })
}

/// ## Summary
/// Deletes a meet that is still a draft.
///
/// ## Errors
/// Returns `NotFound` for an unknown or unmanaged meet and `Conflict` once the
/// meet has left the draft status.
#[tracing::instrument(skip(repo))]
pub async fn delete_meet(repo: &dyn MeetRepository, meet_id: Uuid, actor: &Actor) -> ServiceResult<()> {
    let meet = managed_meet(repo, meet_id, actor).await?;
    let status = meet.status()?;
    if !status.is_deletable() {
        return Err(ServiceError::Conflict(format!(
            "Only draft meets can be deleted (meet is {status})"
        )));
    }

    // The status may have changed since the read above.
    if !repo.delete_draft(meet_id).await? {
        return Err(ServiceError::Conflict(
            "Only draft meets can be deleted".to_string(),
        ));
    }

    tracing::info!(%meet_id, "Draft meet deleted");
    Ok(())
}

/// ## Summary
/// Creates a draft meet owned by the calling organizer.
///
/// ## Errors
/// - `AuthorizationError` for the worker, or for an organization the
///   organizer does not belong to.
/// - `ValidationError` for a missing name or invalid fields.
#[tracing::instrument(skip(repo, request))]
pub async fn create_meet(
    repo: &dyn MeetRepository,
    actor: &Actor,
    request: NewMeetRequest,
) -> ServiceResult<Meet> {
    let Actor::Organizer {
        user_id,
        organization_ids,
    } = actor
    else {
        return Err(ServiceError::AuthorizationError(
            "Meets are created by organizers".to_string(),
        ));
    };
    if let Some(org) = request.organization_id
        && !organization_ids.contains(&org)
    {
        return Err(ServiceError::AuthorizationError(format!(
            "Not a member of organization {org}"
        )));
    }

    request.details.validate()?;
    let name = request
        .details
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ServiceError::ValidationError("Name is required".to_string()))?
        .to_string();
    let mut candidate = blank_meet(*user_id);
    request.details.apply(&mut candidate);
    check_date_order(&candidate)?;

    let meet = repo
        .create_meet(MeetDraft {
            name,
            organizer_id: *user_id,
            organization_id: request.organization_id,
            share_code: generate_share_code(),
            details: request.details,
        })
        .await?;

    tracing::info!(meet_id = %meet.id, "Meet created");
    Ok(meet)
}

fn blank_meet(organizer_id: Uuid) -> Meet {
    let now = Utc::now();
    Meet {
        id: Uuid::nil(),
        name: String::new(),
        description: None,
        organizer_id,
        organization_id: None,
        share_code: String::new(),
        location: None,
        start_time: None,
        end_time: None,
        opening_date: None,
        closing_date: None,
        scheduled_date: None,
        confirm_date: None,
        capacity: None,
        waitlist_size: None,
        status_id: MeetStatus::Draft.id(),
        created_at: now,
        updated_at: now,
    }
}

/// ## Summary
/// Edits a meet's details. Status is not editable here.
///
/// ## Errors
/// - `ValidationError` for invalid fields.
/// - `NotFound` for an unknown or unmanaged meet.
/// - `Conflict` when [`check_meet_update`] refuses the change.
#[tracing::instrument(skip(repo, patch))]
pub async fn update_meet(
    repo: &dyn MeetRepository,
    meet_id: Uuid,
    actor: &Actor,
    patch: MeetPatch,
) -> ServiceResult<Meet> {
    patch.validate()?;
    managed_meet(repo, meet_id, actor).await?;

    let updated = repo
        .update_meet(meet_id, &patch, Utc::now())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Meet {meet_id}")))?;

    tracing::info!(%meet_id, "Meet updated");
    Ok(updated)
}

/// ## Summary
/// Lists the meets the actor manages, with counts, one page at a time.
///
/// `page` starts at 1; `limit` is clamped to `1..=MAX_PAGE_SIZE`.
///
/// ## Errors
/// Returns an error if the store cannot be read.
pub async fn list_meets(
    repo: &dyn MeetRepository,
    actor: &Actor,
    view: MeetView,
    page: Option<i64>,
    limit: Option<i64>,
) -> ServiceResult<MeetPage> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let managed_by = match actor {
        Actor::Worker => None,
        Actor::Organizer {
            user_id,
            organization_ids,
        } => Some((*user_id, organization_ids.clone())),
    };

    let (meets, total) = repo
        .list_meets(&MeetQuery {
            statuses: view.statuses(),
            managed_by,
            limit,
            offset: (page - 1).saturating_mul(limit),
        })
        .await?;

    let ids: Vec<Uuid> = meets.iter().map(|meet| meet.id).collect();
    let mut totals: HashMap<Uuid, Vec<(AttendeeStatus, i64)>> = HashMap::new();
    for (meet_id, status, n) in repo.status_totals(&ids).await? {
        totals.entry(meet_id).or_default().push((status, n));
    }

    let items = meets
        .into_iter()
        .map(|meet| {
            let counts = accounting::tally(totals.remove(&meet.id).unwrap_or_default());
            MeetWithCounts { meet, counts }
        })
        .collect();

    Ok(MeetPage {
        items,
        total,
        page,
        limit,
    })
}

/// ## Errors
/// Returns an error if the catalogue cannot be read.
pub async fn list_statuses(repo: &dyn MeetRepository) -> ServiceResult<Vec<MeetStatusRow>> {
    repo.list_statuses().await
}
