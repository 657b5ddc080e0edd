use crate::auth::{UserPrincipal, USER_KEY};
use crate::session::{FlashKind, Session};
use crate::AppState;
use axum::{
    extract::{OriginalUri, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error};

/// Session key holding the path to return to after logging in.
pub const REDIRECT_KEY: &str = "returnTo";
pub const LOGIN_REQUIRED_MESSAGE: &str = "You must be logged in to create listing!";

/// The visitor behind the current request, if logged in.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<UserPrincipal>);

impl CurrentUser {
    pub fn principal(&self) -> Option<&UserPrincipal> {
        self.0.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }
}

/// Resolves the session's user identifier into a [`CurrentUser`].
///
/// A stale identifier (user deleted) is dropped from the session. A failing
/// user store leaves the request anonymous instead of failing it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = request.extensions().get::<Session>().cloned();

    let principal = match session.as_ref().and_then(|s| s.get::<String>(USER_KEY)) {
        Some(identifier) => match state.auth.deserialize(&identifier).await {
            Ok(Some(principal)) => Some(principal),
            Ok(None) => {
                debug!(identifier = %identifier, "session refers to an unknown user");
                if let Some(session) = &session {
                    state.auth.logout(session);
                }
                None
            }
            Err(e) => {
                error!(error = %e, "failed to load the session user, continuing anonymously");
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(CurrentUser(principal));
    next.run(request).await
}

/// Flashes an error, remembers where the visitor was heading and sends them
/// to the login page.
pub fn login_redirect(session: Option<&Session>, method: &Method, path: &str) -> Response {
    if let Some(session) = session {
        if method == Method::GET {
            if let Err(e) = session.insert(REDIRECT_KEY, path) {
                error!(error = %e, "failed to remember the requested path");
            }
        }
        session.push_flash(FlashKind::Error, LOGIN_REQUIRED_MESSAGE);
    }

    Redirect::to("/login").into_response()
}

/// Route layer for pages that need a logged-in visitor.
pub async fn require_login(request: Request, next: Next) -> Response {
    let authenticated = request
        .extensions()
        .get::<CurrentUser>()
        .map_or(false, CurrentUser::is_authenticated);

    if authenticated {
        return next.run(request).await;
    }

    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    debug!(path = %path, "login required");

    login_redirect(request.extensions().get::<Session>(), request.method(), &path)
}
