use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, error, warn};

use crate::session::cookie::SessionCookie;
use crate::session::model::{Session, SessionOutcome, SessionStatus};
use crate::session::store::SessionStore;
use crate::AppState;

/// Resolves the session for a request and commits it once the response is
/// ready.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cookie: SessionCookie,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, cookie: SessionCookie) -> Self {
        Self { store, cookie }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Session {
        let expires_at = Utc::now() + self.cookie.max_age();

        let Some(id) = self.cookie.session_id(headers) else {
            return Session::new(expires_at);
        };

        match self.store.load(&id).await {
            Ok(Some(record)) => Session::loaded(record),
            Ok(None) => {
                debug!(session_id = %id, "session not found in store, starting a new one");
                Session::new(expires_at)
            }
            Err(e) => {
                error!(session_id = %id, error = %e, "ERROR in session store, continuing with a transient session");
                Session::transient(id, expires_at)
            }
        }
    }

    /// Persists whatever the handler chain did to the session and sets the
    /// cookie. Store failures are logged and never change the response status.
    pub async fn commit(&self, session: &Session, response: &mut Response) {
        let SessionOutcome {
            mut record,
            status,
            dirty,
            destroyed,
            replaced,
        } = session.outcome();

        if status == SessionStatus::Transient {
            return;
        }

        if let Some(previous) = replaced {
            if let Err(e) = self.store.destroy(&previous).await {
                warn!(session_id = %previous, error = %e, "failed to destroy replaced session");
            }
        }

        if destroyed {
            if status == SessionStatus::Loaded {
                if let Err(e) = self.store.destroy(&record.id).await {
                    warn!(session_id = %record.id, error = %e, "failed to destroy session");
                }
            }
            if let Some(header) = self.cookie.expire() {
                response.headers_mut().append(SET_COOKIE, header);
            }
            return;
        }

        let now = Utc::now();
        record.expires_at = now + self.cookie.max_age();

        let live = if dirty {
            match self.store.save(&record).await {
                Ok(()) => true,
                Err(e) => {
                    error!(session_id = %record.id, error = %e, "failed to save session");
                    status == SessionStatus::Loaded
                }
            }
        } else if status == SessionStatus::Loaded {
            if let Err(e) = self.store.touch(&record.id, record.expires_at).await {
                warn!(session_id = %record.id, error = %e, "failed to touch session");
            }
            true
        } else {
            true
        };

        if live {
            if let Some(header) = self.cookie.issue(&record.id, now) {
                response.headers_mut().append(SET_COOKIE, header);
            }
        }
    }
}

pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = state.sessions.resolve(request.headers()).await;
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    state.sessions.commit(&session, &mut response).await;
    response
}
