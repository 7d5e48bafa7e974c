//! Query composition for meets and attendees.

pub mod attendee;
pub mod due;
pub mod meet;
