//! Scheduler ticks driving the real API over HTTP.
//!
//! ## Coverage
//! - A due meet is opened through `PATCH /api/v1/meets/{id}/status`
//! - The request carries the worker credential and a camelCase body
//! - Rejected, unreachable and unanswered updates are counted without
//!   stopping the batch

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};

use adventuremeets_test::component::config::TransitionGuard;
use adventuremeets_test::component::domain::status::MeetStatus;
use adventuremeets_test::component::model::meet::Meet;
use adventuremeets_test::component::remote::{HttpStatusClient, StatusUpdater};
use adventuremeets_test::component::repository::memory::{MemoryRepository, meet_fixture};
use adventuremeets_test::component::scheduler::{MeetScheduler, TickOutcome, TickSummary};

use super::helpers::{RecordingEndpoint, SilentEndpoint, WORKER_KEY, free_port, spawn_api};

fn open_due(repo: &MemoryRepository) -> Meet {
    let now = Utc::now();
    let meet = Meet {
        opening_date: Some(now - Duration::hours(1)),
        closing_date: Some(now + Duration::hours(1)),
        ..meet_fixture(MeetStatus::Published)
    };
    repo.insert_meet(meet.clone());
    meet
}

fn scheduler(repo: &MemoryRepository, client: HttpStatusClient) -> MeetScheduler {
    let updater: Arc<dyn StatusUpdater> = Arc::new(client);
    MeetScheduler::new(Arc::new(repo.clone()), Some(updater), 3)
}

async fn tick(scheduler: &MeetScheduler) -> TickSummary {
    match scheduler.trigger().await.expect("tick") {
        TickOutcome::Completed(summary) => summary,
        other => panic!("expected a completed tick, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_scheduler_opens_meet_through_api() {
    let repo = MemoryRepository::new();
    let meet = open_due(&repo);
    let api = spawn_api(Arc::new(repo.clone()), TransitionGuard::Strict).await;
    let scheduler = scheduler(&repo, api.status_client(WORKER_KEY));

    let summary = tick(&scheduler).await;

    assert_eq!(summary.opened, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(repo.meet(meet.id).unwrap().status_id, MeetStatus::Open.id());

    // Already open; nothing left to do.
    let again = tick(&scheduler).await;
    assert_eq!(again.updated(), 0);
    assert_eq!(repo.sessions_released(), 2);
}

#[test_log::test(tokio::test)]
async fn test_wrong_worker_key_counts_as_failure() {
    let repo = MemoryRepository::new();
    let meet = open_due(&repo);
    let api = spawn_api(Arc::new(repo.clone()), TransitionGuard::Permissive).await;
    let scheduler = scheduler(&repo, api.status_client("not-the-key"));

    let summary = tick(&scheduler).await;

    assert_eq!((summary.opened, summary.failed), (0, 1));
    assert_eq!(
        repo.meet(meet.id).unwrap().status_id,
        MeetStatus::Published.id()
    );
    assert!(!scheduler.state().in_flight);
}

#[test_log::test(tokio::test)]
async fn test_update_request_shape() {
    let repo = MemoryRepository::new();
    let meet = open_due(&repo);
    let endpoint = RecordingEndpoint::default();
    let server = endpoint.spawn().await;
    let scheduler = scheduler(&repo, server.status_client(WORKER_KEY));

    tick(&scheduler).await;

    let calls = endpoint.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "PATCH");
    assert_eq!(calls[0].path, format!("/api/v1/meets/{}/status", meet.id));
    assert_eq!(calls[0].api_key.as_deref(), Some(WORKER_KEY));
    assert_eq!(calls[0].body, serde_json::json!({ "statusId": 3 }));
}

#[test_log::test(tokio::test)]
async fn test_rejected_update_does_not_stop_batch() {
    let repo = MemoryRepository::new();
    let first = open_due(&repo);
    let second = open_due(&repo);
    let third = open_due(&repo);
    let endpoint = RecordingEndpoint::default();
    endpoint.reject(second.id);
    let server = endpoint.spawn().await;
    let scheduler = scheduler(&repo, server.status_client(WORKER_KEY));

    let summary = tick(&scheduler).await;

    assert_eq!((summary.opened, summary.failed), (2, 1));
    let paths: Vec<String> = endpoint.calls().into_iter().map(|call| call.path).collect();
    for meet in [&first, &second, &third] {
        assert!(paths.iter().any(|path| path.contains(&meet.id.to_string())));
    }
}

#[test_log::test(tokio::test)]
async fn test_unreachable_api_is_survivable() {
    let repo = MemoryRepository::new();
    open_due(&repo);
    // Nothing listens on a port that was free a moment ago.
    let origin = format!("http://127.0.0.1:{}", free_port());
    let client = HttpStatusClient::new(origin, WORKER_KEY, std::time::Duration::from_secs(2))
        .expect("client");
    let scheduler = scheduler(&repo, client);

    let summary = tick(&scheduler).await;

    assert_eq!((summary.opened, summary.failed), (0, 1));
    assert_eq!(repo.sessions_released(), 1);
}

#[test_log::test(tokio::test)]
async fn test_unanswered_update_times_out() {
    let repo = MemoryRepository::new();
    let meet = open_due(&repo);
    let endpoint = SilentEndpoint::spawn().await;
    let client = HttpStatusClient::new(
        endpoint.origin.clone(),
        WORKER_KEY,
        std::time::Duration::from_secs(1),
    )
    .expect("client");
    let scheduler = scheduler(&repo, client);

    let summary = tokio::time::timeout(std::time::Duration::from_secs(10), tick(&scheduler))
        .await
        .expect("tick should finish once the request times out");

    assert_eq!((summary.opened, summary.failed), (0, 1));
    assert!(!scheduler.state().in_flight);
    assert_eq!(repo.sessions_released(), 1);
    assert_eq!(
        repo.meet(meet.id).unwrap().status_id,
        MeetStatus::Published.id()
    );
}
