use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
    response::Response,
};
use std::convert::Infallible;

use crate::auth::UserPrincipal;
use crate::middleware::auth::{login_redirect, CurrentUser};
use crate::session::Session;

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned().unwrap_or_default())
    }
}

/// A logged-in visitor. Anonymous requests are sent to the login page.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserPrincipal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts
            .extensions
            .get::<CurrentUser>()
            .and_then(|user| user.0.clone())
        {
            return Ok(AuthUser(principal));
        }

        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Err(login_redirect(parts.extensions.get::<Session>(), &parts.method, &path))
    }
}
