//! SQLite-backed record store for enhancement jobs.
//!
//! [`repositories::JobRepo`] is the only code that touches the `jobs` table;
//! [`lifecycle::JobLifecycle`] layers the state machine on top of its
//! conditional update.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub mod lifecycle;
pub mod models;
pub mod repositories;

pub use lifecycle::{JobLifecycle, TransitionError};

pub type DbPool = sqlx::SqlitePool;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a connection pool from a database URL, creating the file if needed.
///
/// WAL journaling lets status polls read while a runner is writing.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
}

/// Run a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
