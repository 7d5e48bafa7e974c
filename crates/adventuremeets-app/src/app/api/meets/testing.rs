//! Shared setup for the meet handler tests.

use std::sync::Arc;

use salvo::{Router, Service};

use crate::config::{ConfigHandler, Settings, TransitionGuard};
use crate::repository_handler::RepositoryHandler;
use adventuremeets_service::repository::memory::MemoryRepository;

pub const BASE: &str = "http://127.0.0.1:5800/api/v1/meets";
pub const WORKER_KEY: &str = "worker-secret";

pub fn settings(guard: TransitionGuard) -> Settings {
    let mut settings = Settings::load_with(|_| None).unwrap();
    settings.auth.worker_api_key = Some(WORKER_KEY.to_string());
    settings.status.transition_guard = guard;
    settings
}

/// The full API router over an in-memory store.
pub fn service(repo: &MemoryRepository, guard: TransitionGuard) -> Service {
    let router = Router::new()
        .hoop(RepositoryHandler {
            repository: Arc::new(repo.clone()),
        })
        .hoop(ConfigHandler::new(settings(guard)))
        .push(crate::app::api::routes());
    Service::new(router)
}
