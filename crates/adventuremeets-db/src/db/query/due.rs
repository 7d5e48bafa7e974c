//! Lookups of meets whose scheduling or capacity conditions are met.
//!
//! ## Summary
//! Each function returns ids only. Callers supply the source statuses so the
//! edge being driven is defined in one place, next to the transition table.
//! Re-running a lookup after a partial failure is safe: meets that already left
//! their source status no longer match.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::Bool;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::schema::meets;
use adventuremeets_core::status::MeetStatus;

/// Which scheduling column a time-based lookup compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueColumn {
    OpeningDate,
    ClosingDate,
    EndTime,
}

fn status_ids(statuses: &[MeetStatus]) -> Vec<i32> {
    statuses.iter().map(|s| s.id()).collect()
}

/// ## Summary
/// Ids of meets in one of `statuses` whose `column` is set and not after `now`.
///
/// ## Errors
/// Returns an error if the database operation fails.
#[tracing::instrument(skip(conn))]
pub async fn time_due(
    conn: &mut AsyncPgConnection,
    statuses: &[MeetStatus],
    column: DueColumn,
    now: DateTime<Utc>,
) -> QueryResult<Vec<Uuid>> {
    let query = meets::table
        .filter(meets::status_id.eq_any(status_ids(statuses)))
        .select(meets::id)
        .order(meets::id.asc())
        .into_boxed();

    let query = match column {
        DueColumn::OpeningDate => query
            .filter(meets::opening_date.is_not_null())
            .filter(meets::opening_date.le(now)),
        DueColumn::ClosingDate => query
            .filter(meets::closing_date.is_not_null())
            .filter(meets::closing_date.le(now)),
        DueColumn::EndTime => query
            .filter(meets::end_time.is_not_null())
            .filter(meets::end_time.le(now)),
    };

    query.load(conn).await
}

/// ## Summary
/// Ids of meets in one of `statuses` with a positive `waitlist_size` whose
/// waitlisted attendee count has reached it.
///
/// A `waitlist_size` of 0 or NULL means the meet has no waitlist and never matches.
///
/// ## Errors
/// Returns an error if the database operation fails.
#[tracing::instrument(skip(conn))]
pub async fn waitlist_full(
    conn: &mut AsyncPgConnection,
    statuses: &[MeetStatus],
) -> QueryResult<Vec<Uuid>> {
    meets::table
        .filter(meets::status_id.eq_any(status_ids(statuses)))
        .filter(meets::waitlist_size.is_not_null())
        .filter(meets::waitlist_size.gt(0))
        .filter(diesel::dsl::sql::<Bool>(
            "(SELECT count(*) FROM meet_attendees wl \
             WHERE wl.meet_id = meets.id AND wl.status = 'waitlisted') >= meets.waitlist_size",
        ))
        .select(meets::id)
        .order(meets::id.asc())
        .load(conn)
        .await
}
