//! Dependency-light domain types shared by every adventuremeets crate.

pub mod attendee;
pub mod config;
pub mod constants;
pub mod error;
pub mod status;
pub mod util;
