//! Database enum types with Diesel serialization.
//!
//! Each enum implements `ToSql` and `FromSql` for automatic conversion between Rust and `PostgreSQL`.

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use std::fmt;
use std::io::Write;

/// Attendee status.
///
/// Maps to `meet_attendees.status` CHECK constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub struct AttendeeStatus(pub adventuremeets_core::attendee::AttendeeStatus);

impl ToSql<Text, Pg> for AttendeeStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.0.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for AttendeeStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = std::str::from_utf8(bytes.as_bytes())?;
        Ok(Self(raw.parse()?))
    }
}

impl From<adventuremeets_core::attendee::AttendeeStatus> for AttendeeStatus {
    fn from(status: adventuremeets_core::attendee::AttendeeStatus) -> Self {
        Self(status)
    }
}

impl From<AttendeeStatus> for adventuremeets_core::attendee::AttendeeStatus {
    fn from(status: AttendeeStatus) -> Self {
        status.0
    }
}

impl fmt::Display for AttendeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
