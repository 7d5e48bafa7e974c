//! In-memory storage for tests.
//!
//! Mirrors the `PostgreSQL` behavior the services rely on: draft-only deletes,
//! signups only while open, unique contact keys per meet, serialized attendee
//! status changes. It also
//! counts scheduler sessions so tests can check that every acquired session is
//! released, can be told to fail lookups, and can run a concurrent write right
//! after a meet is read.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use adventuremeets_core::attendee::{AttendeeCounts, AttendeeStatus};
use adventuremeets_core::status::MeetStatus;
use adventuremeets_db::error::DbError;
use adventuremeets_db::model::attendee::Attendee;
use adventuremeets_db::model::meet::{Meet, MeetStatusRow};

use crate::accounting::{self, Limits};
use crate::error::{ServiceError, ServiceResult};
use crate::meet::{self, MeetPatch};
use crate::predicate::{MeetSchedule, Predicate};

use super::{
    AttendeeDraft, ContactKeys, DueMeetSession, MeetDraft, MeetQuery, MeetRepository,
    SchedulerStore,
};

/// Builds a meet owned by a fresh organizer with no dates or limits set.
#[must_use]
pub fn meet_fixture(status: MeetStatus) -> Meet {
    let now = Utc::now();
    let id = Uuid::now_v7();
    Meet {
        id,
        name: "Table Mountain sunrise hike".to_string(),
        description: None,
        organizer_id: Uuid::now_v7(),
        organization_id: None,
        share_code: id.simple().to_string(),
        location: None,
        start_time: None,
        end_time: None,
        opening_date: None,
        closing_date: None,
        scheduled_date: None,
        confirm_date: None,
        capacity: None,
        waitlist_size: None,
        status_id: status.id(),
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct State {
    meets: BTreeMap<Uuid, Meet>,
    attendees: Vec<Attendee>,
}

impl State {
    fn counts(&self, meet_id: Uuid) -> AttendeeCounts {
        accounting::tally(
            self.attendees
                .iter()
                .filter(|a| a.meet_id == meet_id)
                .map(|a| (a.status.into(), 1)),
        )
    }
}

type AfterFind = Box<dyn FnOnce(&MemoryRepository) + Send>;

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    after_find_meet: Mutex<Option<AfterFind>>,
    fail_queries: AtomicBool,
    sessions_opened: AtomicUsize,
    sessions_released: AtomicUsize,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failure(&self) -> ServiceResult<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(DbError::DatabaseError(diesel::result::Error::QueryBuilderError(
                "injected query failure".into(),
            ))
            .into());
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<Inner>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_meet(&self, meet: Meet) {
        self.inner.state().meets.insert(meet.id, meet);
    }

    #[must_use]
    pub fn meet(&self, meet_id: Uuid) -> Option<Meet> {
        self.inner.state().meets.get(&meet_id).cloned()
    }

    #[must_use]
    pub fn meet_count(&self) -> usize {
        self.inner.state().meets.len()
    }

    /// Stored attendees of one meet in insertion order.
    #[must_use]
    pub fn attendees(&self, meet_id: Uuid) -> Vec<Attendee> {
        self.inner
            .state()
            .attendees
            .iter()
            .filter(|a| a.meet_id == meet_id)
            .cloned()
            .collect()
    }

    /// Adds an attendee directly, bypassing duplicate and capacity checks.
    pub fn add_attendee(&self, meet_id: Uuid, status: AttendeeStatus) -> Attendee {
        let now = Utc::now();
        let attendee = Attendee {
            id: Uuid::now_v7(),
            meet_id,
            user_id: None,
            name: None,
            email: None,
            phone: None,
            email_key: None,
            phone_key: None,
            guests: None,
            status: status.into(),
            created_at: now,
            updated_at: now,
        };
        self.inner.state().attendees.push(attendee.clone());
        attendee
    }

    /// Overwrites a stored meet's status, as another writer would.
    pub fn overwrite_status(&self, meet_id: Uuid, status: MeetStatus) {
        if let Some(meet) = self.inner.state().meets.get_mut(&meet_id) {
            meet.status_id = status.id();
        }
    }

    /// Runs `write` once, right after the next `find_meet` has read its row.
    pub fn after_next_find_meet(&self, write: impl FnOnce(&Self) + Send + 'static) {
        *self
            .inner
            .after_find_meet
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(write));
    }

    /// Makes every subsequent lookup fail until reset.
    pub fn fail_queries(&self, fail: bool) {
        self.inner.fail_queries.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.inner.sessions_opened.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sessions_released(&self) -> usize {
        self.inner.sessions_released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeetRepository for MemoryRepository {
    async fn find_meet(&self, meet_id: Uuid) -> ServiceResult<Option<Meet>> {
        self.inner.check_failure()?;
        let meet = self.meet(meet_id);
        let hook = self
            .inner
            .after_find_meet
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(write) = hook {
            write(self);
        }
        Ok(meet)
    }

    async fn set_status(
        &self,
        meet_id: Uuid,
        status: MeetStatus,
        expected: Option<MeetStatus>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Meet>> {
        self.inner.check_failure()?;
        let mut state = self.inner.state();
        Ok(state
            .meets
            .get_mut(&meet_id)
            .filter(|meet| expected.is_none_or(|from| meet.status_id == from.id()))
            .map(|meet| {
                meet.status_id = status.id();
                meet.updated_at = now;
                meet.clone()
            }))
    }

    async fn create_meet(&self, draft: MeetDraft) -> ServiceResult<Meet> {
        self.inner.check_failure()?;
        let mut state = self.inner.state();
        if state
            .meets
            .values()
            .any(|meet| meet.share_code == draft.share_code)
        {
            return Err(ServiceError::Conflict("Share code already in use".to_string()));
        }

        let now = Utc::now();
        let mut meet = Meet {
            id: Uuid::now_v7(),
            name: draft.name,
            organizer_id: draft.organizer_id,
            organization_id: draft.organization_id,
            share_code: draft.share_code,
            status_id: MeetStatus::Draft.id(),
            created_at: now,
            updated_at: now,
            ..meet_fixture(MeetStatus::Draft)
        };
        MeetPatch {
            name: None,
            ..draft.details
        }
        .apply(&mut meet);
        state.meets.insert(meet.id, meet.clone());
        Ok(meet)
    }

    async fn update_meet(
        &self,
        meet_id: Uuid,
        patch: &MeetPatch,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Meet>> {
        self.inner.check_failure()?;
        let mut state = self.inner.state();
        let counts = state.counts(meet_id);
        let Some(current) = state.meets.get_mut(&meet_id) else {
            return Ok(None);
        };
        meet::check_meet_update(current, &counts, patch)?;
        patch.apply(current);
        current.updated_at = now;
        Ok(Some(current.clone()))
    }

    async fn list_meets(&self, query: &MeetQuery) -> ServiceResult<(Vec<Meet>, i64)> {
        self.inner.check_failure()?;
        let state = self.inner.state();
        let mut matching: Vec<&Meet> = state
            .meets
            .values()
            .filter(|meet| {
                query.statuses.as_ref().is_none_or(|statuses| {
                    statuses.iter().any(|status| status.id() == meet.status_id)
                })
            })
            .filter(|meet| {
                query.managed_by.as_ref().is_none_or(|(user_id, orgs)| {
                    meet.organizer_id == *user_id
                        || meet.organization_id.is_some_and(|org| orgs.contains(&org))
                })
            })
            .collect();
        matching.sort_by_key(|meet| (meet.start_time.is_none(), meet.start_time, meet.id));

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(0))
            .take(usize::try_from(query.limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn status_totals(
        &self,
        meet_ids: &[Uuid],
    ) -> ServiceResult<Vec<(Uuid, AttendeeStatus, i64)>> {
        self.inner.check_failure()?;
        Ok(self
            .inner
            .state()
            .attendees
            .iter()
            .filter(|a| meet_ids.contains(&a.meet_id))
            .map(|a| (a.meet_id, a.status.into(), 1))
            .collect())
    }

    async fn delete_draft(&self, meet_id: Uuid) -> ServiceResult<bool> {
        self.inner.check_failure()?;
        let mut state = self.inner.state();
        let is_draft = state
            .meets
            .get(&meet_id)
            .is_some_and(|meet| meet.status_id == MeetStatus::Draft.id());
        if is_draft {
            state.meets.remove(&meet_id);
            state.attendees.retain(|a| a.meet_id != meet_id);
        }
        Ok(is_draft)
    }

    async fn list_statuses(&self) -> ServiceResult<Vec<MeetStatusRow>> {
        Ok(MeetStatus::ALL
            .into_iter()
            .map(|status| MeetStatusRow {
                id: status.id(),
                name: status.as_str().to_string(),
            })
            .collect())
    }

    async fn attendee_counts(&self, meet_id: Uuid) -> ServiceResult<AttendeeCounts> {
        self.inner.check_failure()?;
        Ok(self.inner.state().counts(meet_id))
    }

    async fn find_attendee_by_contact(
        &self,
        meet_id: Uuid,
        keys: &ContactKeys,
    ) -> ServiceResult<Option<Attendee>> {
        self.inner.check_failure()?;
        Ok(self
            .inner
            .state()
            .attendees
            .iter()
            .find(|a| {
                a.meet_id == meet_id && keys.overlaps(a.email_key.as_deref(), a.phone_key.as_deref())
            })
            .cloned())
    }

    async fn insert_attendee(&self, draft: AttendeeDraft) -> ServiceResult<Attendee> {
        self.inner.check_failure()?;
        let mut state = self.inner.state();
        let meet = state
            .meets
            .get(&draft.meet_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Meet {}", draft.meet_id)))?;
        let status = meet.status()?;
        if !status.accepts_signups() {
            return Err(super::signups_closed(status));
        }
        if let Some(existing) = state.attendees.iter().find(|a| {
            a.meet_id == draft.meet_id
                && draft
                    .keys
                    .overlaps(a.email_key.as_deref(), a.phone_key.as_deref())
        }) {
            return Err(super::already_signed_up(existing.id));
        }

        let now = Utc::now();
        let attendee = Attendee {
            id: Uuid::now_v7(),
            meet_id: draft.meet_id,
            user_id: draft.user_id,
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            email_key: draft.keys.email,
            phone_key: draft.keys.phone,
            guests: draft.guests,
            status: draft.status.into(),
            created_at: now,
            updated_at: now,
        };
        state.attendees.push(attendee.clone());
        Ok(attendee)
    }

    async fn find_attendee(
        &self,
        meet_id: Uuid,
        attendee_id: Uuid,
    ) -> ServiceResult<Option<Attendee>> {
        self.inner.check_failure()?;
        Ok(self
            .inner
            .state()
            .attendees
            .iter()
            .find(|a| a.meet_id == meet_id && a.id == attendee_id)
            .cloned())
    }

    async fn list_attendees(&self, meet_id: Uuid, accepted_only: bool) -> ServiceResult<Vec<Attendee>> {
        self.inner.check_failure()?;
        let mut attendees: Vec<Attendee> = self
            .inner
            .state()
            .attendees
            .iter()
            .filter(|a| a.meet_id == meet_id)
            .filter(|a| !accepted_only || AttendeeStatus::from(a.status).holds_place())
            .cloned()
            .collect();
        attendees.sort_by_key(|a| (a.created_at, a.id));
        Ok(attendees)
    }

    async fn delete_attendee(&self, meet_id: Uuid, attendee_id: Uuid) -> ServiceResult<bool> {
        self.inner.check_failure()?;
        let mut state = self.inner.state();
        let before = state.attendees.len();
        state
            .attendees
            .retain(|a| !(a.meet_id == meet_id && a.id == attendee_id));
        Ok(state.attendees.len() < before)
    }

    async fn update_attendee_status(
        &self,
        meet_id: Uuid,
        attendee_id: Uuid,
        status: AttendeeStatus,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Attendee>> {
        self.inner.check_failure()?;
        let mut state = self.inner.state();
        let Some(limits) = state.meets.get(&meet_id).map(|meet| Limits {
            capacity: meet.capacity,
            waitlist_size: meet.waitlist_size,
        }) else {
            return Ok(None);
        };
        let counts = state.counts(meet_id);

        let Some(attendee) = state
            .attendees
            .iter_mut()
            .find(|a| a.meet_id == meet_id && a.id == attendee_id)
        else {
            return Ok(None);
        };

        accounting::check_status_change(limits, &counts, attendee.status.into(), status)?;
        attendee.status = status.into();
        attendee.updated_at = now;
        Ok(Some(attendee.clone()))
    }
}

struct MemorySession {
    inner: Arc<Inner>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.inner.sessions_released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DueMeetSession for MemorySession {
    async fn due(&mut self, predicate: Predicate, now: DateTime<Utc>) -> ServiceResult<Vec<Uuid>> {
        self.inner.check_failure()?;
        let state = self.inner.state();
        let mut ids = Vec::new();
        for meet in state.meets.values() {
            let schedule = MeetSchedule::from_meet(meet)?;
            if predicate.matches(&schedule, &state.counts(meet.id), now) {
                ids.push(meet.id);
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl SchedulerStore for MemoryRepository {
    async fn acquire(&self) -> ServiceResult<Box<dyn DueMeetSession>> {
        self.inner.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
        }))
    }
}
