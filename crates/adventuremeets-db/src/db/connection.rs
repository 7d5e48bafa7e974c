//! Pooled `PostgreSQL` connections for the meets API and the scheduler.
//!
//! The API checks out one connection per repository call; the scheduler holds
//! an owned connection for a whole tick (see `PgRepository::acquire`), so the
//! pool must be sized for the server's concurrency plus one.

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};

use crate::db::DbProvider;
use crate::error::DbResult;

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection<'pool> = PooledConnection<'pool, AsyncPgConnection>;

/// ## Summary
/// Builds the bb8 pool used by `PgRepository`.
///
/// One idle connection is kept warm and every checkout is health-checked, so a
/// scheduler tick after a database restart gets a live connection or a
/// checkout error instead of a dead socket.
///
/// ## Errors
/// Returns an error if the initial connection to `database_url` fails.
#[tracing::instrument(skip(database_url), fields(pool_size = size))]
pub async fn create_pool(database_url: &str, size: u32) -> anyhow::Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);

    let pool = Pool::builder()
        .max_size(size)
        .min_idle(Some(1))
        .test_on_check_out(true)
        .build(manager)
        .await?;

    tracing::debug!(pool_size = size, "Meets database pool ready");
    Ok(pool)
}

impl DbProvider for DbPool {
    fn get_connection<'a>(
        &'a self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = DbResult<DbConnection<'a>>> + Send + 'a>>
    {
        Box::pin(async move { Ok(self.get().await?) })
    }
}
