use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accepts only ids in the shape `generate` produces.
    pub fn parse(value: &str) -> Option<Self> {
        let uuid = Uuid::try_parse(value).ok()?;
        Some(Self(uuid.simple().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the store keeps for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub data: Map<String, Value>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Freshly allocated; nothing in the store yet.
    New,
    /// Loaded from the store.
    Loaded,
    /// The store was unreachable. Lives for this request only.
    Transient,
}

#[derive(Debug)]
struct SessionState {
    id: SessionId,
    data: Map<String, Value>,
    expires_at: DateTime<Utc>,
    status: SessionStatus,
    dirty: bool,
    destroyed: bool,
    replaced: Option<SessionId>,
}

/// Per-request session handle.
///
/// Cloning is cheap; every clone points at the same state, so the session
/// middleware sees what handlers wrote once the response comes back. The lock
/// is never held across an await.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

/// Snapshot taken by the session middleware after the handler chain ran.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub record: SessionRecord,
    pub status: SessionStatus,
    pub dirty: bool,
    pub destroyed: bool,
    pub replaced: Option<SessionId>,
}

impl Session {
    fn with_state(
        id: SessionId,
        data: Map<String, Value>,
        expires_at: DateTime<Utc>,
        status: SessionStatus,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                id,
                data,
                expires_at,
                status,
                dirty: false,
                destroyed: false,
                replaced: None,
            })),
        }
    }

    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self::with_state(SessionId::generate(), Map::new(), expires_at, SessionStatus::New)
    }

    pub fn loaded(record: SessionRecord) -> Self {
        Self::with_state(record.id, record.data, record.expires_at, SessionStatus::Loaded)
    }

    pub fn transient(id: SessionId, expires_at: DateTime<Utc>) -> Self {
        Self::with_state(id, Map::new(), expires_at, SessionStatus::Transient)
    }

    pub fn id(&self) -> SessionId {
        self.inner.lock().id.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let state = self.inner.lock();
        let value = state.data.get(key)?.clone();
        drop(state);

        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "session value has an unexpected shape");
                None
            }
        }
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), AppError> {
        let value = serde_json::to_value(value)?;
        let mut state = self.inner.lock();
        state.data.insert(key.to_string(), value);
        state.dirty = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.inner.lock();
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.dirty = true;
        }
        removed
    }

    /// Removes `key` and returns its value if it had the expected shape.
    pub fn take<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.remove(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Runs `f` against the session data under a single lock. `f` reports
    /// whether it changed anything.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> (R, bool)) -> R {
        let mut state = self.inner.lock();
        let (result, changed) = f(&mut state.data);
        if changed {
            state.dirty = true;
        }
        result
    }

    /// Moves the data to a fresh id. The old record is destroyed when the
    /// response is committed.
    pub fn cycle_id(&self) {
        let mut state = self.inner.lock();
        let previous = std::mem::replace(&mut state.id, SessionId::generate());
        if state.status == SessionStatus::Loaded {
            state.replaced = Some(previous);
            state.status = SessionStatus::New;
        }
        state.dirty = true;
    }

    /// Invalidates the session; the middleware deletes it and expires the cookie.
    pub fn destroy(&self) {
        let mut state = self.inner.lock();
        state.data.clear();
        state.destroyed = true;
    }

    pub fn outcome(&self) -> SessionOutcome {
        let state = self.inner.lock();
        SessionOutcome {
            record: SessionRecord {
                id: state.id.clone(),
                data: state.data.clone(),
                expires_at: state.expires_at,
            },
            status: state.status,
            dirty: state.dirty,
            destroyed: state.destroyed,
            replaced: state.replaced.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            tracing::error!("Session extractor used on a route without the session middleware");
            AppError::InternalServerError
        })
    }
}
