//! One-shot messages carried in the session to the next rendered page.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;

use crate::session::model::Session;

pub const FLASH_KEY: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

impl Session {
    pub fn push_flash(&self, kind: FlashKind, message: impl Into<String>) {
        let message = Value::String(message.into());
        self.mutate(|data| {
            let flash = data
                .entry(FLASH_KEY)
                .or_insert_with(|| Value::Object(Default::default()));
            if !flash.is_object() {
                *flash = Value::Object(Default::default());
            }
            if let Value::Object(categories) = flash {
                let queue = categories
                    .entry(kind.as_str())
                    .or_insert_with(|| Value::Array(Vec::new()));
                match queue {
                    Value::Array(messages) => messages.push(message),
                    other => *other = Value::Array(vec![message]),
                }
            }
            ((), true)
        })
    }

    /// Reads and clears the queued messages of one category.
    pub fn drain_flash(&self, kind: FlashKind) -> Vec<String> {
        self.mutate(|data| {
            let Some(Value::Object(categories)) = data.get_mut(FLASH_KEY) else {
                return (Vec::new(), false);
            };
            let Some(queue) = categories.remove(kind.as_str()) else {
                return (Vec::new(), false);
            };
            if categories.is_empty() {
                data.remove(FLASH_KEY);
            }

            let messages = match queue {
                Value::Array(values) => values
                    .into_iter()
                    .filter_map(|value| match value {
                        Value::String(message) => Some(message),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            (messages, true)
        })
    }
}

/// Messages drained for the current request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlashMessages {
    pub success: Vec<String>,
    pub error: Vec<String>,
}

impl FlashMessages {
    pub fn drain(session: &Session) -> Self {
        Self {
            success: session.drain_flash(FlashKind::Success),
            error: session.drain_flash(FlashKind::Error),
        }
    }
}

/// Queued messages of the current request, drained from the session the
/// first time a page asks for them. Requests that render nothing, such as
/// static files or `/health`, leave the queue for the next page.
#[derive(Clone, Default)]
pub struct PendingFlash {
    session: Option<Session>,
    drained: Arc<Mutex<Option<FlashMessages>>>,
}

impl PendingFlash {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            session,
            drained: Arc::default(),
        }
    }

    /// Drains the session queue once; later calls return the same messages.
    pub fn take(&self) -> FlashMessages {
        let mut drained = self.drained.lock();
        drained
            .get_or_insert_with(|| {
                self.session
                    .as_ref()
                    .map(FlashMessages::drain)
                    .unwrap_or_default()
            })
            .clone()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for FlashMessages
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<PendingFlash>()
            .map(PendingFlash::take)
            .unwrap_or_default())
    }
}

pub async fn flash_middleware(mut request: Request, next: Next) -> Response {
    let pending = PendingFlash::new(request.extensions().get::<Session>().cloned());
    request.extensions_mut().insert(pending);
    next.run(request).await
}
