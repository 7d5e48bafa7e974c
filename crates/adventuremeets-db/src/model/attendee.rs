use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*};
use serde::Serialize;

use crate::db::{enums::AttendeeStatus, schema};

/// A signup for a meet.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = schema::meet_attendees)]
#[diesel(check_for_backend(Pg))]
#[diesel(belongs_to(crate::model::meet::Meet, foreign_key = meet_id))]
pub struct Attendee {
    pub id: uuid::Uuid,
    pub meet_id: uuid::Uuid,
    pub user_id: Option<uuid::Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub email_key: Option<String>,
    pub phone_key: Option<String>,
    pub guests: Option<i32>,
    pub status: AttendeeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of an attendee; the comparison keys stay internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeView {
    pub id: uuid::Uuid,
    pub meet_id: uuid::Uuid,
    pub user_id: Option<uuid::Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub guests: Option<i32>,
    pub status: adventuremeets_core::attendee::AttendeeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Attendee> for AttendeeView {
    fn from(attendee: Attendee) -> Self {
        Self {
            id: attendee.id,
            meet_id: attendee.meet_id,
            user_id: attendee.user_id,
            name: attendee.name,
            email: attendee.email,
            phone: attendee.phone,
            guests: attendee.guests,
            status: attendee.status.into(),
            created_at: attendee.created_at,
            updated_at: attendee.updated_at,
        }
    }
}

/// Insert struct for new signups
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::meet_attendees)]
pub struct NewAttendee<'a> {
    pub id: uuid::Uuid,
    pub meet_id: uuid::Uuid,
    pub user_id: Option<uuid::Uuid>,
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub email_key: Option<&'a str>,
    pub phone_key: Option<&'a str>,
    pub guests: Option<i32>,
    pub status: AttendeeStatus,
}
