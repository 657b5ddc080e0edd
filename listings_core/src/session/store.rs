use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::session::model::{SessionId, SessionRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt session record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Durable home of session records, shared by every request.
///
/// Implementations provide their own consistency; callers never hold a lock
/// across these calls and concurrent writes to one id are last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns `None` for unknown or expired ids.
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;
    /// Extends the expiry of an unmodified session. May be skipped when the
    /// session was touched recently.
    async fn touch(&self, id: &SessionId, expires_at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn destroy(&self, id: &SessionId) -> Result<(), StoreError>;
}
