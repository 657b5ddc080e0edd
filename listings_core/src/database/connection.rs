use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trips a trivial query through the pool.
    pub async fn health_check(&self) -> Result<()> {
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "database did not answer the health probe");
                AppError::from(e)
            })?;

        if one != 1 {
            return Err(AppError::Database(format!("unexpected health probe result {}", one)));
        }
        Ok(())
    }
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Database(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    Ok(options)
}

fn pool_options(config: &DatabaseConfig) -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
}

pub async fn get_database_pool(database_url: &str) -> Result<SqlitePool> {
    connect_database(&DatabaseConfig {
        url: database_url.to_string(),
        ..DatabaseConfig::default()
    })
    .await
}

pub async fn connect_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    info!(url = %config.url, max_connections = config.max_connections, "connecting to database");

    let pool = pool_options(config)
        .connect_with(connect_options(&config.url)?)
        .await
        .map_err(|e| {
            error!(url = %config.url, error = %e, "could not open database pool");
            AppError::from(e)
        })?;

    info!("database pool ready");
    Ok(pool)
}

/// Pool that opens connections on first use. Lets the server keep listening
/// while the database is unreachable; queries fail until it comes back.
pub fn lazy_database_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    warn!(url = %config.url, "falling back to a lazily connecting pool");
    Ok(pool_options(config)
        .min_connections(0)
        .connect_lazy_with(connect_options(&config.url)?))
}
