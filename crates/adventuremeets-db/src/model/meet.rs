use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*};
use serde::Serialize;

use crate::db::schema;
use adventuremeets_core::error::CoreResult;
use adventuremeets_core::status::MeetStatus;

/// An organizer-created event with scheduling and capacity settings.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = schema::meets)]
#[diesel(check_for_backend(Pg))]
#[serde(rename_all = "camelCase")]
pub struct Meet {
    pub id: uuid::Uuid,
    pub name: String,
    pub description: Option<String>,
    pub organizer_id: uuid::Uuid,
    pub organization_id: Option<uuid::Uuid>,
    pub share_code: String,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub opening_date: Option<DateTime<Utc>>,
    pub closing_date: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub confirm_date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub waitlist_size: Option<i32>,
    pub status_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meet {
    /// ## Summary
    /// Decodes `status_id`.
    ///
    /// ## Errors
    /// Returns `CoreError::UnknownStatus` if the stored id is outside the known set.
    pub fn status(&self) -> CoreResult<MeetStatus> {
        MeetStatus::try_from(self.status_id)
    }
}

/// Insert struct for creating new meets
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::meets)]
pub struct NewMeet<'a> {
    pub id: uuid::Uuid,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub organizer_id: uuid::Uuid,
    pub organization_id: Option<uuid::Uuid>,
    pub share_code: &'a str,
    pub location: Option<&'a str>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub opening_date: Option<DateTime<Utc>>,
    pub closing_date: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub confirm_date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub waitlist_size: Option<i32>,
    pub status_id: i32,
}

/// Editable meet columns; `None` leaves a column unchanged.
///
/// Status and ownership are not part of it; status moves only through the
/// status endpoint.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = schema::meets)]
pub struct MeetChanges<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub location: Option<&'a str>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub opening_date: Option<DateTime<Utc>>,
    pub closing_date: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub confirm_date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub waitlist_size: Option<i32>,
}

/// Row of the `meet_statuses` lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = schema::meet_statuses)]
#[diesel(check_for_backend(Pg))]
pub struct MeetStatusRow {
    pub id: i32,
    pub name: String,
}
