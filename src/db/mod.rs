//! Query helpers, one module per entity.
//!
//! Every helper takes a `&mut SqliteConnection` so that handlers can run a
//! group of them on a pooled connection or inside one transaction.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::SqlitePool;

use crate::errors::AppError;

pub mod account;
pub mod booking;
pub mod commission;
pub mod content;
pub mod favorite;
pub mod member;
pub mod profile;
pub mod property;
pub mod review;
pub mod reward;
pub mod stats;
pub mod tier;
pub mod variable;
pub mod withdrawal;

pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .read_only(false)
        .busy_timeout(Duration::from_secs(5));

    let db_pool = SqlitePool::connect_with(opts).await?;
    sqlx::migrate!().run(&db_pool).await?;
    log::info!("Database migrated successfully");
    Ok(db_pool)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Maps "no rows updated/deleted" to a not-found error.
pub(crate) fn expect_affected(
    result: sqlx::sqlite::SqliteQueryResult,
    entity: &'static str,
) -> Result<(), AppError> {
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(entity));
    }
    Ok(())
}
