use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Creates the SQLite connection pool and applies pending migrations.
///
/// WAL mode gives concurrent readers alongside the single writer that
/// runs the cycle.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    info!("Opening SQLite database at {database_url}");

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid DATABASE_URL '{database_url}'"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("SQLite pool established and schema up to date");
    Ok(pool)
}

/// Applies the embedded migrations. Safe to run on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[cfg(test)]
pub mod testing {
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    /// In-memory database with the schema applied.
    ///
    /// Every `:memory:` connection is its own database, so the pool is pinned
    /// to a single connection.
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        super::run_migrations(&pool).await.expect("migrations");
        pool
    }
}
