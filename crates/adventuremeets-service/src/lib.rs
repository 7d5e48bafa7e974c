//! Meet lifecycle services: predicates, accounting, the status write path,
//! public signup, and the scheduler that drives automatic transitions.

pub mod accounting;
pub mod error;
pub mod meet;
pub mod predicate;
pub mod remote;
pub mod repository;
pub mod scheduler;
pub mod signup;
