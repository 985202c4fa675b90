//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
use std::{env, str::FromStr, time::Duration};

use log::{info, trace};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    Sqlite,
    SqlitePool,
    Transaction,
};

pub mod carts;
pub mod drafts;
pub mod listings;
pub mod orders;
pub mod transactions;

const SQLITE_DB_URL: &str = "sqlite://data/agromart.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("AMS_DATABASE_URL").unwrap_or_else(|_| {
        info!("AMS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// Opens a connection pool in WAL mode, so that readers never block the single writer. Writers queue for up to
/// [`BUSY_TIMEOUT`] before the database reports itself as locked.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Starts a transaction that holds the database write lock from its first statement, like `BEGIN IMMEDIATE`.
///
/// A deferred transaction that reads before it writes cannot wait for the write lock: if another writer commits in
/// between, SQLite fails the upgrade at once with `database is locked`. Taking the lock with a no-op write first lets
/// the transaction queue on the busy timeout instead. Use this for every transaction that writes.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, SqlxError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM write_lock WHERE 0").execute(&mut *tx).await?;
    trace!("🗃️ Write lock taken");
    Ok(tx)
}
