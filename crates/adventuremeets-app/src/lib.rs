//! HTTP API and scheduler process for meets.

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repository_handler;
pub mod telemetry;
