#![allow(clippy::expect_used, dead_code)]
//! Test helpers for integration tests.
//!
//! Provides utilities for:
//! - Serving the API on a real port so the scheduler can reach it over HTTP
//! - Standing in for the API with an endpoint that records what it receives
//! - Setting up an isolated, migrated database per test
//!
//! ## Database Isolation
//! Each Postgres test names its own database, which is dropped and recreated
//! on entry. The tests are skipped when `TEST_DATABASE_URL` is not set.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use salvo::conn::TcpListener;
use salvo::http::StatusCode;
use salvo::{Depot, FlowCtrl, Handler, Listener, Request, Response, Router};
use tokio::task::JoinHandle;
use uuid::Uuid;

use adventuremeets_test::app::RepositoryHandler;
use adventuremeets_test::app::api::routes;
use adventuremeets_test::component::config::{ConfigHandler, Settings, TransitionGuard};
use adventuremeets_test::component::db::connection::{DbPool, create_pool};
use adventuremeets_test::component::db::migrations::run_pending_migrations;
use adventuremeets_test::component::db::query;
use adventuremeets_test::component::domain::status::MeetStatus;
use adventuremeets_test::component::model::meet::{Meet, NewMeet};
use adventuremeets_test::component::remote::HttpStatusClient;
use adventuremeets_test::component::repository::MeetRepository;

pub const WORKER_KEY: &str = "integration-worker-key";

/// Locks a mutex and recovers from poisoning.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            mutex.clear_poison();
            poisoned.into_inner()
        }
    }
}

pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("Failed to find a free port")
}

/// A server running on a local port; aborted when dropped.
pub struct TestServer {
    pub origin: String,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl TestServer {
    async fn start(router: Router) -> Self {
        let port = free_port();
        let acceptor = TcpListener::new(("127.0.0.1", port)).bind().await;
        let handle = tokio::spawn(async move {
            salvo::Server::new(acceptor).serve(router).await;
        });
        Self {
            origin: format!("http://127.0.0.1:{port}"),
            handle,
        }
    }

    /// A status client pointed at this server.
    pub fn status_client(&self, api_key: &str) -> HttpStatusClient {
        HttpStatusClient::new(self.origin.clone(), api_key, Duration::from_secs(5))
            .expect("Failed to build status client")
    }
}

pub fn settings(guard: TransitionGuard) -> Settings {
    let mut settings = Settings::load_with(|_| None).expect("Default settings load");
    settings.auth.worker_api_key = Some(WORKER_KEY.to_string());
    settings.status.transition_guard = guard;
    settings
}

/// Serves the full API over `repository`.
pub async fn spawn_api(repository: Arc<dyn MeetRepository>, guard: TransitionGuard) -> TestServer {
    let router = Router::new()
        .hoop(RepositoryHandler { repository })
        .hoop(ConfigHandler::new(settings(guard)))
        .push(routes());
    TestServer::start(router).await
}

/// A port that accepts connections and never answers on them.
pub struct SilentEndpoint {
    pub origin: String,
    handle: JoinHandle<()>,
}

impl Drop for SilentEndpoint {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl SilentEndpoint {
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind silent endpoint");
        let port = listener.local_addr().expect("Bound address").port();
        let handle = tokio::spawn(async move {
            // Held open until the task is aborted.
            let mut held = Vec::new();
            while let Ok((socket, _addr)) = listener.accept().await {
                held.push(socket);
            }
        });
        Self {
            origin: format!("http://127.0.0.1:{port}"),
            handle,
        }
    }
}

/// One request seen by [`RecordingEndpoint`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub api_key: Option<String>,
    pub body: serde_json::Value,
}

/// Accepts any request, records it and answers 500 for paths mentioning a
/// rejected meet id.
#[derive(Clone, Default)]
pub struct RecordingEndpoint {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    reject: Arc<Mutex<Vec<Uuid>>>,
}

impl RecordingEndpoint {
    pub fn reject(&self, meet_id: Uuid) {
        lock(&self.reject).push(meet_id);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub async fn spawn(&self) -> TestServer {
        TestServer::start(Router::with_path("{**rest}").goal(self.clone())).await
    }
}

#[salvo::async_trait]
impl Handler for RecordingEndpoint {
    async fn handle(
        &self,
        req: &mut Request,
        _depot: &mut Depot,
        res: &mut Response,
        _ctrl: &mut FlowCtrl,
    ) {
        let path = req.uri().path().to_string();
        let call = RecordedCall {
            method: req.method().to_string(),
            api_key: req.header::<String>("x-api-key"),
            body: req
                .parse_json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::Value::Null),
            path: path.clone(),
        };
        lock(&self.calls).push(call);

        let rejected = lock(&self.reject)
            .iter()
            .any(|id| path.contains(&id.to_string()));
        res.status_code(if rejected {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        });
    }
}

/// A migrated database of its own.
pub struct TestDb {
    pub pool: DbPool,
    pub url: String,
}

fn base_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
}

/// ## Summary
/// Recreates `adventuremeets_test_{name}` and applies the migrations.
///
/// ## Returns
/// `None` when `TEST_DATABASE_URL` is not set.
pub async fn test_db(name: &str) -> anyhow::Result<Option<TestDb>> {
    let Some(base_url) = base_database_url() else {
        eprintln!("[TestDb] TEST_DATABASE_URL not set, skipping {name}");
        return Ok(None);
    };

    let db_name = format!("adventuremeets_test_{name}");
    {
        let mut admin = AsyncPgConnection::establish(&format!("{base_url}/postgres")).await?;
        diesel::sql_query(format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
            .execute(&mut admin)
            .await?;
        diesel::sql_query(format!("CREATE DATABASE \"{db_name}\""))
            .execute(&mut admin)
            .await?;
    }

    let url = format!("{base_url}/{db_name}");
    run_pending_migrations(&url).await?;
    let pool = create_pool(&url, 4).await?;

    Ok(Some(TestDb { pool, url }))
}

/// Scheduling and limit columns for a test meet; everything else is filler.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeetSpec {
    pub opening_date: Option<DateTime<Utc>>,
    pub closing_date: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub waitlist_size: Option<i32>,
}

impl TestDb {
    pub async fn insert_meet(&self, status: MeetStatus, spec: MeetSpec) -> anyhow::Result<Meet> {
        let id = Uuid::now_v7();
        let share_code = id.simple().to_string();
        let mut conn = self.pool.get().await?;
        let meet = query::meet::insert(
            &mut conn,
            &NewMeet {
                id,
                name: "Lion's Head full moon hike",
                description: None,
                organizer_id: Uuid::now_v7(),
                organization_id: None,
                share_code: &share_code,
                location: Some("Signal Hill Road"),
                start_time: None,
                end_time: spec.end_time,
                opening_date: spec.opening_date,
                closing_date: spec.closing_date,
                scheduled_date: None,
                confirm_date: None,
                capacity: spec.capacity,
                waitlist_size: spec.waitlist_size,
                status_id: status.id(),
            },
        )
        .await?;
        Ok(meet)
    }

    pub async fn meet(&self, meet_id: Uuid) -> anyhow::Result<Meet> {
        let mut conn = self.pool.get().await?;
        query::meet::find_by_id(&mut conn, meet_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("meet {meet_id} missing"))
    }
}
