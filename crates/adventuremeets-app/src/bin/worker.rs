//! Scheduler process: applies time- and capacity-driven status transitions.

use std::sync::Arc;

use adventuremeets_app::telemetry;
use adventuremeets_core::config::load_config;
use adventuremeets_db::db::connection::create_pool;
use adventuremeets_service::remote::{HttpStatusClient, StatusUpdater};
use adventuremeets_service::repository::pg::PgRepository;
use adventuremeets_service::scheduler::MeetScheduler;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter_handle = telemetry::init();

    tracing::info!("Starting meet scheduler");

    let config = load_config()?;

    tracing::info!(config = ?config.worker, "Configuration loaded");

    telemetry::apply_level(&filter_handle, &config.logging.level);

    let pool = create_pool(
        &config.database.url,
        u32::from(config.database.max_connections),
    )
    .await?;

    let updater = HttpStatusClient::from_config(&config.worker)?
        .map(|client| Arc::new(client) as Arc<dyn StatusUpdater>);
    if updater.is_none() {
        tracing::warn!("API_BASE_URL or WORKER_API_KEY not set; running without status updates");
    }

    let scheduler = Arc::new(MeetScheduler::new(
        Arc::new(PgRepository::new(pool)),
        updater,
        config.worker.max_consecutive_skips,
    ));

    scheduler.run(config.worker.interval()).await?;

    Ok(())
}
