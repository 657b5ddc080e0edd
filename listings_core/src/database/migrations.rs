use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{error, info, warn};

use crate::error::{AppError, Result};

/// Applies the schema in version order. Each version runs in its own
/// transaction and is recorded in `_migrations`.
pub struct MigrationManager {
    pool: SqlitePool,
}

impl MigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL,
                checksum TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let applied = self.get_migration_history().await?;
        for record in &applied {
            let known = MIGRATIONS.iter().find(|m| m.version == record.version);
            if known.map_or(true, |m| m.checksum != record.checksum) {
                warn!(version = record.version, name = %record.name, "applied migration does not match this build");
            }
        }

        let current = applied.last().map_or(0, |record| record.version);
        let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
        if pending.is_empty() {
            info!(version = current, "database schema is up to date");
            return Ok(());
        }

        for migration in &pending {
            info!(version = migration.version, name = migration.name, "applying migration");
            self.apply(migration).await?;
        }

        info!(applied = pending.len(), from = current, "database migrations complete");
        Ok(())
    }

    async fn apply(&self, migration: &Migration) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for statement in migration.statements {
            sqlx::query(statement).execute(&mut *tx).await.map_err(|e| {
                error!(version = migration.version, error = %e, "migration statement failed");
                AppError::from(e)
            })?;
        }

        sqlx::query("INSERT INTO _migrations (version, name, applied_at, checksum) VALUES (?, ?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(Utc::now().to_rfc3339())
            .bind(migration.checksum)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_migration_history(&self) -> Result<Vec<MigrationRecord>> {
        let rows = sqlx::query("SELECT version, name, applied_at, checksum FROM _migrations ORDER BY version")
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let applied_at: String = row.try_get("applied_at")?;
            records.push(MigrationRecord {
                version: row.try_get("version")?,
                name: row.try_get("name")?,
                applied_at: DateTime::parse_from_rfc3339(&applied_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                checksum: row.try_get("checksum")?,
            });
        }

        Ok(records)
    }
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users_table",
        checksum: "users_v1",
        statements: &[
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        ],
    },
    Migration {
        version: 2,
        name: "create_sessions_table",
        checksum: "sessions_v1",
        statements: &[
            r#"
            CREATE TABLE sessions (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL DEFAULT '{}',
                expires_at TEXT NOT NULL,
                touched_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX idx_sessions_expires_at ON sessions(expires_at)",
        ],
    },
    Migration {
        version: 3,
        name: "create_listings_table",
        checksum: "listings_v1",
        statements: &[
            r#"
            CREATE TABLE listings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                image_url TEXT,
                price INTEGER NOT NULL DEFAULT 0,
                location TEXT NOT NULL,
                country TEXT NOT NULL,
                owner_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX idx_listings_created_at ON listings(created_at)",
        ],
    },
    Migration {
        version: 4,
        name: "create_reviews_table",
        checksum: "reviews_v1",
        statements: &[
            r#"
            CREATE TABLE reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                listing_id INTEGER NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
                author_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX idx_reviews_listing_id ON reviews(listing_id)",
        ],
    },
];

#[derive(Debug)]
struct Migration {
    version: i64,
    name: &'static str,
    checksum: &'static str,
    statements: &'static [&'static str],
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
    pub checksum: String,
}

pub async fn run_migrations(pool: SqlitePool) -> Result<()> {
    let migration_manager = MigrationManager::new(pool);
    migration_manager.run_migrations().await
}
