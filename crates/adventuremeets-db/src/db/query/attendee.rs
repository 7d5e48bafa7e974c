//! Query composition for `meet_attendees`.

use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::enums::AttendeeStatus;
use crate::db::schema::meet_attendees;
use crate::model::attendee::{Attendee, NewAttendee};

/// ## Summary
/// Counts attendees of one meet grouped by status.
///
/// Statuses without rows are absent from the result; an empty meet yields an
/// empty vector.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn status_totals(
    conn: &mut AsyncPgConnection,
    meet_id: Uuid,
) -> QueryResult<Vec<(AttendeeStatus, i64)>> {
    meet_attendees::table
        .filter(meet_attendees::meet_id.eq(meet_id))
        .group_by(meet_attendees::status)
        .select((meet_attendees::status, count_star()))
        .load(conn)
        .await
}

/// ## Summary
/// Per-meet status totals for a set of meets, for list views.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn status_totals_for(
    conn: &mut AsyncPgConnection,
    meet_ids: &[Uuid],
) -> QueryResult<Vec<(Uuid, AttendeeStatus, i64)>> {
    if meet_ids.is_empty() {
        return Ok(Vec::new());
    }
    meet_attendees::table
        .filter(meet_attendees::meet_id.eq_any(meet_ids))
        .group_by((meet_attendees::meet_id, meet_attendees::status))
        .select((meet_attendees::meet_id, meet_attendees::status, count_star()))
        .load(conn)
        .await
}

/// ## Summary
/// Lists a meet's attendees in signup order, optionally limited to some statuses.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn list_for_meet(
    conn: &mut AsyncPgConnection,
    meet_id: Uuid,
    statuses: Option<&[AttendeeStatus]>,
) -> QueryResult<Vec<Attendee>> {
    let mut query = meet_attendees::table
        .filter(meet_attendees::meet_id.eq(meet_id))
        .select(Attendee::as_select())
        .order((meet_attendees::created_at.asc(), meet_attendees::id.asc()))
        .into_boxed();
    if let Some(statuses) = statuses {
        query = query.filter(meet_attendees::status.eq_any(statuses.to_vec()));
    }
    query.load(conn).await
}

/// ## Summary
/// Removes one attendee of a meet.
///
/// ## Returns
/// Number of rows removed.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn delete(conn: &mut AsyncPgConnection, meet_id: Uuid, attendee_id: Uuid) -> QueryResult<usize> {
    diesel::delete(
        meet_attendees::table
            .filter(meet_attendees::meet_id.eq(meet_id))
            .filter(meet_attendees::id.eq(attendee_id)),
    )
    .execute(conn)
    .await
}

/// ## Summary
/// Finds an attendee of the meet whose normalized email or phone matches.
///
/// At least one key must be given; with none this returns `Ok(None)` without
/// touching the database.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn find_by_contact_keys(
    conn: &mut AsyncPgConnection,
    meet_id: Uuid,
    email_key: Option<&str>,
    phone_key: Option<&str>,
) -> QueryResult<Option<Attendee>> {
    let base = meet_attendees::table
        .filter(meet_attendees::meet_id.eq(meet_id))
        .select(Attendee::as_select())
        .order(meet_attendees::created_at.asc());

    match (email_key, phone_key) {
        (Some(email), Some(phone)) => {
            base.filter(
                meet_attendees::email_key
                    .eq(email)
                    .or(meet_attendees::phone_key.eq(phone)),
            )
            .first(conn)
            .await
            .optional()
        }
        (Some(email), None) => {
            base.filter(meet_attendees::email_key.eq(email))
                .first(conn)
                .await
                .optional()
        }
        (None, Some(phone)) => {
            base.filter(meet_attendees::phone_key.eq(phone))
                .first(conn)
                .await
                .optional()
        }
        (None, None) => Ok(None),
    }
}

/// ## Summary
/// Inserts an attendee and returns the stored row.
///
/// ## Errors
/// Returns an error if the database operation fails, including the unique
/// contact-key indexes rejecting a duplicate.
pub async fn insert(conn: &mut AsyncPgConnection, attendee: &NewAttendee<'_>) -> QueryResult<Attendee> {
    diesel::insert_into(meet_attendees::table)
        .values(attendee)
        .returning(Attendee::as_returning())
        .get_result(conn)
        .await
}

/// ## Summary
/// Loads one attendee of a meet.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn find(
    conn: &mut AsyncPgConnection,
    meet_id: Uuid,
    attendee_id: Uuid,
) -> QueryResult<Option<Attendee>> {
    meet_attendees::table
        .filter(meet_attendees::meet_id.eq(meet_id))
        .filter(meet_attendees::id.eq(attendee_id))
        .select(Attendee::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Sets an attendee's status.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn update_status(
    conn: &mut AsyncPgConnection,
    meet_id: Uuid,
    attendee_id: Uuid,
    status: AttendeeStatus,
    now: DateTime<Utc>,
) -> QueryResult<Option<Attendee>> {
    diesel::update(
        meet_attendees::table
            .filter(meet_attendees::meet_id.eq(meet_id))
            .filter(meet_attendees::id.eq(attendee_id)),
    )
    .set((
        meet_attendees::status.eq(status),
        meet_attendees::updated_at.eq(now),
    ))
    .returning(Attendee::as_returning())
    .get_result(conn)
    .await
    .optional()
}
