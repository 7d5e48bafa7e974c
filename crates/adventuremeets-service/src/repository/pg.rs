//! `PostgreSQL` implementation of the storage seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::scoped_futures::ScopedFutureExt;
use uuid::Uuid;

use adventuremeets_core::attendee::{AttendeeCounts, AttendeeStatus};
use adventuremeets_core::status::MeetStatus;
use adventuremeets_db::db::DbProvider;
use adventuremeets_db::db::connection::DbPool;
use adventuremeets_db::db::enums::AttendeeStatus as DbAttendeeStatus;
use adventuremeets_db::db::query::due::{self, DueColumn};
use adventuremeets_db::db::query::meet::MeetListFilter;
use adventuremeets_db::db::query::{attendee, meet};
use adventuremeets_db::db::transaction::with_transaction;
use adventuremeets_db::error::DbError;
use adventuremeets_db::model::attendee::{Attendee, NewAttendee};
use adventuremeets_db::model::meet::{Meet, MeetChanges, MeetStatusRow, NewMeet};

use crate::accounting::{self, Limits};
use crate::error::{ServiceError, ServiceResult};
use crate::meet::{MeetPatch, check_meet_update};
use crate::predicate::Predicate;

use super::{
    AttendeeDraft, ContactKeys, DueMeetSession, MeetDraft, MeetQuery, MeetRepository,
    SchedulerStore,
};

#[derive(Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn counts(conn: &mut AsyncPgConnection, meet_id: Uuid) -> diesel::QueryResult<AttendeeCounts> {
    let totals = attendee::status_totals(conn, meet_id).await?;
    Ok(accounting::tally(
        totals.into_iter().map(|(status, n)| (status.into(), n)),
    ))
}

fn changes(patch: &MeetPatch) -> MeetChanges<'_> {
    MeetChanges {
        name: patch.name.as_deref().map(str::trim),
        description: patch.description.as_deref(),
        location: patch.location.as_deref(),
        start_time: patch.start_time,
        end_time: patch.end_time,
        opening_date: patch.opening_date,
        closing_date: patch.closing_date,
        scheduled_date: patch.scheduled_date,
        confirm_date: patch.confirm_date,
        capacity: patch.capacity,
        waitlist_size: patch.waitlist_size,
    }
}

#[async_trait]
impl MeetRepository for PgRepository {
    #[tracing::instrument(skip(self))]
    async fn find_meet(&self, meet_id: Uuid) -> ServiceResult<Option<Meet>> {
        let mut conn = self.pool.get_connection().await?;
        Ok(meet::find_by_id(&mut conn, meet_id).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn set_status(
        &self,
        meet_id: Uuid,
        status: MeetStatus,
        expected: Option<MeetStatus>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Meet>> {
        let mut conn = self.pool.get_connection().await?;
        let updated = match expected {
            Some(from) => meet::update_status_from(&mut conn, meet_id, from, status, now).await?,
            None => meet::update_status(&mut conn, meet_id, status, now).await?,
        };
        Ok(updated)
    }

    #[tracing::instrument(skip(self, draft), fields(organizer_id = %draft.organizer_id))]
    async fn create_meet(&self, draft: MeetDraft) -> ServiceResult<Meet> {
        let mut conn = self.pool.get_connection().await?;
        let details = &draft.details;
        let row = NewMeet {
            id: Uuid::now_v7(),
            name: &draft.name,
            description: details.description.as_deref(),
            organizer_id: draft.organizer_id,
            organization_id: draft.organization_id,
            share_code: &draft.share_code,
            location: details.location.as_deref(),
            start_time: details.start_time,
            end_time: details.end_time,
            opening_date: details.opening_date,
            closing_date: details.closing_date,
            scheduled_date: details.scheduled_date,
            confirm_date: details.confirm_date,
            capacity: details.capacity,
            waitlist_size: details.waitlist_size,
            status_id: MeetStatus::Draft.id(),
        };

        meet::insert(&mut conn, &row).await.map_err(|err| {
            let err = DbError::from(err);
            if err.is_unique_violation() {
                ServiceError::Conflict("Share code already in use".to_string())
            } else {
                err.into()
            }
        })
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_meet(
        &self,
        meet_id: Uuid,
        patch: &MeetPatch,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Meet>> {
        let mut conn = self.pool.get_connection().await?;

        with_transaction(&mut conn, move |tx| {
            async move {
                let Some(current) = meet::lock_by_id(tx, meet_id).await? else {
                    return Ok(None);
                };
                let counts = counts(tx, meet_id).await?;
                check_meet_update(&current, &counts, patch)?;

                Ok::<_, ServiceError>(meet::update_fields(tx, meet_id, &changes(patch), now).await?)
            }
            .scope_boxed()
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn list_meets(&self, query: &MeetQuery) -> ServiceResult<(Vec<Meet>, i64)> {
        let mut conn = self.pool.get_connection().await?;
        let filter = MeetListFilter {
            status_ids: query
                .statuses
                .as_ref()
                .map(|statuses| statuses.iter().map(|status| status.id()).collect()),
            managed_by: query.managed_by.clone(),
        };

        let meets = meet::list(&mut conn, &filter, query.limit, query.offset).await?;
        let total = meet::count(&mut conn, &filter).await?;
        Ok((meets, total))
    }

    async fn status_totals(
        &self,
        meet_ids: &[Uuid],
    ) -> ServiceResult<Vec<(Uuid, AttendeeStatus, i64)>> {
        let mut conn = self.pool.get_connection().await?;
        let totals = attendee::status_totals_for(&mut conn, meet_ids).await?;
        Ok(totals
            .into_iter()
            .map(|(meet_id, status, n)| (meet_id, status.into(), n))
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_draft(&self, meet_id: Uuid) -> ServiceResult<bool> {
        let mut conn = self.pool.get_connection().await?;
        Ok(meet::delete_draft(&mut conn, meet_id).await? > 0)
    }

    async fn list_statuses(&self) -> ServiceResult<Vec<MeetStatusRow>> {
        let mut conn = self.pool.get_connection().await?;
        Ok(meet::list_statuses(&mut conn).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn attendee_counts(&self, meet_id: Uuid) -> ServiceResult<AttendeeCounts> {
        let mut conn = self.pool.get_connection().await?;
        Ok(counts(&mut conn, meet_id).await?)
    }

    #[tracing::instrument(skip(self, keys))]
    async fn find_attendee_by_contact(
        &self,
        meet_id: Uuid,
        keys: &ContactKeys,
    ) -> ServiceResult<Option<Attendee>> {
        let mut conn = self.pool.get_connection().await?;
        Ok(attendee::find_by_contact_keys(
            &mut conn,
            meet_id,
            keys.email.as_deref(),
            keys.phone.as_deref(),
        )
        .await?)
    }

    #[tracing::instrument(skip(self, draft), fields(meet_id = %draft.meet_id))]
    async fn insert_attendee(&self, draft: AttendeeDraft) -> ServiceResult<Attendee> {
        let mut conn = self.pool.get_connection().await?;
        let meet_id = draft.meet_id;

        with_transaction(&mut conn, move |tx| {
            async move {
                // Status changes wait for the insert to commit.
                let locked = meet::lock_by_id(tx, meet_id)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Meet {meet_id}")))?;
                let status = locked.status()?;
                if !status.accepts_signups() {
                    return Err(super::signups_closed(status));
                }

                if let Some(existing) = attendee::find_by_contact_keys(
                    tx,
                    meet_id,
                    draft.keys.email.as_deref(),
                    draft.keys.phone.as_deref(),
                )
                .await?
                {
                    return Err(super::already_signed_up(existing.id));
                }

                let row = NewAttendee {
                    id: Uuid::now_v7(),
                    meet_id,
                    user_id: draft.user_id,
                    name: draft.name.as_deref(),
                    email: draft.email.as_deref(),
                    phone: draft.phone.as_deref(),
                    email_key: draft.keys.email.as_deref(),
                    phone_key: draft.keys.phone.as_deref(),
                    guests: draft.guests,
                    status: draft.status.into(),
                };
                attendee::insert(tx, &row).await.map_err(|err| {
                    let err = DbError::from(err);
                    if err.is_unique_violation() {
                        ServiceError::Conflict(
                            "Attendee already signed up for this meet".to_string(),
                        )
                    } else {
                        err.into()
                    }
                })
            }
            .scope_boxed()
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_attendee(
        &self,
        meet_id: Uuid,
        attendee_id: Uuid,
    ) -> ServiceResult<Option<Attendee>> {
        let mut conn = self.pool.get_connection().await?;
        Ok(attendee::find(&mut conn, meet_id, attendee_id).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn list_attendees(&self, meet_id: Uuid, accepted_only: bool) -> ServiceResult<Vec<Attendee>> {
        let mut conn = self.pool.get_connection().await?;
        let accepted: Vec<DbAttendeeStatus> = AttendeeStatus::ALL
            .into_iter()
            .filter(|status| status.holds_place())
            .map(DbAttendeeStatus::from)
            .collect();
        let statuses = accepted_only.then_some(accepted.as_slice());
        Ok(attendee::list_for_meet(&mut conn, meet_id, statuses).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_attendee(&self, meet_id: Uuid, attendee_id: Uuid) -> ServiceResult<bool> {
        let mut conn = self.pool.get_connection().await?;
        Ok(attendee::delete(&mut conn, meet_id, attendee_id).await? > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn update_attendee_status(
        &self,
        meet_id: Uuid,
        attendee_id: Uuid,
        status: AttendeeStatus,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Attendee>> {
        let mut conn = self.pool.get_connection().await?;

        with_transaction(&mut conn, move |tx| {
            async move {
                let Some(locked) = meet::lock_by_id(tx, meet_id).await? else {
                    return Ok(None);
                };
                let Some(current) = attendee::find(tx, meet_id, attendee_id).await? else {
                    return Ok(None);
                };

                let limits = Limits {
                    capacity: locked.capacity,
                    waitlist_size: locked.waitlist_size,
                };
                let counts = counts(tx, meet_id).await?;
                accounting::check_status_change(limits, &counts, current.status.into(), status)?;

                Ok::<_, ServiceError>(
                    attendee::update_status(tx, meet_id, attendee_id, status.into(), now).await?,
                )
            }
            .scope_boxed()
        })
        .await
    }
}

/// Holds one pooled connection for the length of a scheduler tick.
struct PgDueSession {
    conn: PooledConnection<'static, AsyncPgConnection>,
}

#[async_trait]
impl DueMeetSession for PgDueSession {
    #[tracing::instrument(skip(self))]
    async fn due(&mut self, predicate: Predicate, now: DateTime<Utc>) -> ServiceResult<Vec<Uuid>> {
        let conn: &mut AsyncPgConnection = &mut self.conn;
        let sources = predicate.sources();
        let ids = match predicate {
            Predicate::OpenDue => due::time_due(conn, sources, DueColumn::OpeningDate, now).await,
            Predicate::CloseDue => due::time_due(conn, sources, DueColumn::ClosingDate, now).await,
            Predicate::WaitlistFull => due::waitlist_full(conn, sources).await,
            Predicate::EndDue => due::time_due(conn, sources, DueColumn::EndTime, now).await,
        };
        Ok(ids?)
    }
}

#[async_trait]
impl SchedulerStore for PgRepository {
    async fn acquire(&self) -> ServiceResult<Box<dyn DueMeetSession>> {
        let conn = self.pool.get_owned().await.map_err(DbError::from)?;
        Ok(Box::new(PgDueSession { conn }))
    }
}
