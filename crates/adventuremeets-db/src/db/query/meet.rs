//! Query composition for `meets`.

use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::schema::{meet_statuses, meets};
use crate::model::meet::{Meet, MeetChanges, MeetStatusRow, NewMeet};
use adventuremeets_core::status::MeetStatus;

/// ## Summary
/// Loads a meet by id.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn find_by_id(conn: &mut AsyncPgConnection, meet_id: Uuid) -> QueryResult<Option<Meet>> {
    meets::table
        .find(meet_id)
        .select(Meet::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Loads a meet and locks its row until the surrounding transaction ends.
///
/// Attendee status changes take this lock first so two concurrent
/// confirmations cannot both see a free place.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn lock_by_id(conn: &mut AsyncPgConnection, meet_id: Uuid) -> QueryResult<Option<Meet>> {
    meets::table
        .find(meet_id)
        .select(Meet::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Inserts a meet and returns the stored row.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn insert(conn: &mut AsyncPgConnection, meet: &NewMeet<'_>) -> QueryResult<Meet> {
    diesel::insert_into(meets::table)
        .values(meet)
        .returning(Meet::as_returning())
        .get_result(conn)
        .await
}

/// Which meets a listing covers.
#[derive(Debug, Clone, Default)]
pub struct MeetListFilter {
    /// Only meets with one of these status ids.
    pub status_ids: Option<Vec<i32>>,
    /// Only meets organized by this user or owned by one of these organizations.
    pub managed_by: Option<(Uuid, Vec<Uuid>)>,
}

fn filtered(filter: &MeetListFilter) -> meets::BoxedQuery<'static, Pg> {
    let mut query = meets::table.into_boxed();
    if let Some(status_ids) = &filter.status_ids {
        query = query.filter(meets::status_id.eq_any(status_ids.clone()));
    }
    if let Some((user_id, organization_ids)) = &filter.managed_by {
        query = if organization_ids.is_empty() {
            query.filter(meets::organizer_id.eq(*user_id))
        } else {
            query.filter(
                meets::organizer_id
                    .eq(*user_id)
                    .or(meets::organization_id.eq_any(organization_ids.clone())),
            )
        };
    }
    query
}

/// ## Summary
/// Lists one page of meets ordered by start time; meets without one come last.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn list(
    conn: &mut AsyncPgConnection,
    filter: &MeetListFilter,
    limit: i64,
    offset: i64,
) -> QueryResult<Vec<Meet>> {
    filtered(filter)
        .select(Meet::as_select())
        .order((meets::start_time.asc(), meets::id.asc()))
        .limit(limit)
        .offset(offset)
        .load(conn)
        .await
}

/// ## Summary
/// Counts every meet matching the filter, ignoring paging.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn count(conn: &mut AsyncPgConnection, filter: &MeetListFilter) -> QueryResult<i64> {
    filtered(filter).count().get_result(conn).await
}

/// ## Summary
/// Applies the given column changes and bumps `updated_at`.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn update_fields(
    conn: &mut AsyncPgConnection,
    meet_id: Uuid,
    changes: &MeetChanges<'_>,
    now: DateTime<Utc>,
) -> QueryResult<Option<Meet>> {
    diesel::update(meets::table.find(meet_id))
        .set((changes, meets::updated_at.eq(now)))
        .returning(Meet::as_returning())
        .get_result(conn)
        .await
        .optional()
}

/// ## Summary
/// Sets `status_id` unconditionally and bumps `updated_at`.
///
/// ## Returns
/// The updated row, or `None` if no meet has this id.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn update_status(
    conn: &mut AsyncPgConnection,
    meet_id: Uuid,
    status: MeetStatus,
    now: DateTime<Utc>,
) -> QueryResult<Option<Meet>> {
    diesel::update(meets::table.find(meet_id))
        .set((meets::status_id.eq(status.id()), meets::updated_at.eq(now)))
        .returning(Meet::as_returning())
        .get_result(conn)
        .await
        .optional()
}

/// ## Summary
/// Sets `status_id` only if the meet still has status `from`.
///
/// ## Returns
/// The updated row, or `None` if no meet has this id or its status has
/// changed since the caller read it.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn update_status_from(
    conn: &mut AsyncPgConnection,
    meet_id: Uuid,
    from: MeetStatus,
    to: MeetStatus,
    now: DateTime<Utc>,
) -> QueryResult<Option<Meet>> {
    diesel::update(
        meets::table
            .filter(meets::id.eq(meet_id))
            .filter(meets::status_id.eq(from.id())),
    )
    .set((meets::status_id.eq(to.id()), meets::updated_at.eq(now)))
    .returning(Meet::as_returning())
    .get_result(conn)
    .await
    .optional()
}

/// ## Summary
/// Deletes a meet only while it is still a draft.
///
/// ## Returns
/// Number of rows removed (0 when missing or no longer a draft).
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn delete_draft(conn: &mut AsyncPgConnection, meet_id: Uuid) -> QueryResult<usize> {
    diesel::delete(
        meets::table
            .filter(meets::id.eq(meet_id))
            .filter(meets::status_id.eq(MeetStatus::Draft.id())),
    )
    .execute(conn)
    .await
}

/// ## Summary
/// Lists the status catalogue ordered by id.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn list_statuses(conn: &mut AsyncPgConnection) -> QueryResult<Vec<MeetStatusRow>> {
    meet_statuses::table
        .order(meet_statuses::id.asc())
        .select(MeetStatusRow::as_select())
        .load(conn)
        .await
}
