use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use postgate_core::config::PostgresConfig;

/// Open a connection pool against the configured database.
pub async fn init_pool(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect(&config.connection_string())
        .await?;
    info!(host = %config.host, db = %config.database, "PostgreSQL connected");
    Ok(pool)
}

/// Create the `post` table when it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS post (
            id      INTEGER,
            user_id INTEGER,
            title   TEXT,
            body    TEXT
        )",
    )
    .execute(pool)
    .await?;
    info!("post table ready");
    Ok(())
}
