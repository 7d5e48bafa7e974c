//! Postgres persistence for meets and attendees.

pub mod db;
pub mod error;
pub mod model;
