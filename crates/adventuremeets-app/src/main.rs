use std::sync::Arc;

use salvo::conn::TcpListener;
use salvo::{Listener, Router};

use adventuremeets_app::app::api::routes;
use adventuremeets_app::config::ConfigHandler;
use adventuremeets_app::repository_handler::RepositoryHandler;
use adventuremeets_app::telemetry;
use adventuremeets_core::config::load_config;
use adventuremeets_db::db::connection::create_pool;
use adventuremeets_db::db::migrations::run_pending_migrations;
use adventuremeets_service::repository::pg::PgRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter_handle = telemetry::init();

    tracing::info!("Starting meets API server");

    let config = load_config()?;

    tracing::info!(config = ?config, "Configuration loaded");

    telemetry::apply_level(&filter_handle, &config.logging.level);

    run_pending_migrations(&config.database.url).await?;

    let pool = create_pool(
        &config.database.url,
        u32::from(config.database.max_connections),
    )
    .await?;

    tracing::info!("Database connection pool created.");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let acceptor = TcpListener::new(bind_addr.clone()).bind().await;

    let router = Router::new()
        .hoop(RepositoryHandler {
            repository: Arc::new(PgRepository::new(pool)),
        })
        .hoop(ConfigHandler::new(config.clone()))
        .push(routes());

    tracing::info!("Server listening on {bind_addr}");

    salvo::Server::new(acceptor).serve(router).await;

    Ok(())
}
