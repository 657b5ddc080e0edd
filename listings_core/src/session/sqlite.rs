use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::session::model::{SessionId, SessionRecord};
use crate::session::store::{SessionStore, StoreError};

/// Session store backed by the `sessions` table.
///
/// Keeps an LRU of the last time each session was written so that touches of
/// unmodified sessions only reach the database once per `touch_after`.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    touch_after: chrono::Duration,
    touched: Arc<Mutex<LruCache<SessionId, DateTime<Utc>>>>,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool, touch_after: chrono::Duration, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            pool,
            touch_after,
            touched: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn from_config(pool: SqlitePool, config: &SessionConfig) -> Self {
        Self::new(
            pool,
            chrono::Duration::seconds(config.touch_after_seconds),
            config.touch_cache_size,
        )
    }

    fn recently_touched(&self, id: &SessionId, now: DateTime<Utc>) -> bool {
        self.touched
            .lock()
            .get(id)
            .map_or(false, |last| now - *last < self.touch_after)
    }

    fn remember_touch(&self, id: &SessionId, at: DateTime<Utc>) {
        self.touched.lock().put(id.clone(), at);
    }

    /// Deletes every expired record. Returns how many were removed.
    pub async fn prune_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {:?}: {}", value, e)))
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query("SELECT data, expires_at, touched_at FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: String = row.try_get("expires_at")?;
        let expires_at = parse_timestamp(&expires_at)?;
        if expires_at <= Utc::now() {
            debug!(session_id = %id, "session expired");
            if let Err(e) = self.destroy(id).await {
                warn!(session_id = %id, error = %e, "failed to delete expired session");
            }
            return Ok(None);
        }

        let data: String = row.try_get("data")?;
        let data: Map<String, Value> = serde_json::from_str(&data)?;

        let touched_at: String = row.try_get("touched_at")?;
        self.remember_touch(id, parse_timestamp(&touched_at)?);

        Ok(Some(SessionRecord {
            id: id.clone(),
            data,
            expires_at,
        }))
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let now = Utc::now();
        let data = serde_json::to_string(&record.data)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expires_at, touched_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                expires_at = excluded.expires_at,
                touched_at = excluded.touched_at
            "#,
        )
        .bind(record.id.as_str())
        .bind(data)
        .bind(timestamp(record.expires_at))
        .bind(timestamp(now))
        .execute(&self.pool)
        .await?;

        self.remember_touch(&record.id, now);
        Ok(())
    }

    async fn touch(&self, id: &SessionId, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        let now = Utc::now();
        if self.recently_touched(id, now) {
            return Ok(());
        }

        sqlx::query("UPDATE sessions SET expires_at = ?, touched_at = ? WHERE id = ?")
            .bind(timestamp(expires_at))
            .bind(timestamp(now))
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        self.remember_touch(id, now);
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        self.touched.lock().pop(id);
        Ok(())
    }
}
