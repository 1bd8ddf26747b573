//! Postgres pool for the submitted-sessions record store.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Record writes are rare; a small pool is plenty.
const MAX_CONNECTIONS: u32 = 4;

/// Connect to Postgres and apply the `submitted_sessions` migration.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    tracing::info!("record store migrations applied");

    Ok(pool)
}
