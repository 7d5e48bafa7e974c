pub mod attendee;
pub mod meet;
