//! Integration tests spanning the API, the scheduler and the database.

mod helpers;
mod postgres;
mod scheduler_http;
