//! Signup, login and logout.

use axum::{
    extract::{Form, State},
    response::{Html, Redirect},
    routing::get,
    Router,
};
use tracing::info;

use crate::auth::{AuthError, LoginRequest, RegisterRequest};
use crate::error::Result;
use crate::middleware::REDIRECT_KEY;
use crate::session::{FlashKind, Session};
use crate::views::RequestContext;
use crate::AppState;

pub const SIGNUP_WELCOME: &str = "Welcome to Wanderlust!";
pub const LOGIN_WELCOME: &str = "Welcome back to Wanderlust!";
pub const LOGIN_FAILED: &str = "Invalid username or password";
pub const LOGGED_OUT: &str = "You are logged out!";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", get(signup_form).post(signup))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
}

async fn signup_form(State(state): State<AppState>, context: RequestContext) -> Result<Html<String>> {
    state.templates.page("users/signup.html", &context.view())
}

async fn signup(
    State(state): State<AppState>,
    session: Session,
    Form(request): Form<RegisterRequest>,
) -> Result<Redirect> {
    match state.auth.register(request).await {
        Ok(principal) => {
            state.auth.login(&session, &principal)?;
            session.push_flash(FlashKind::Success, SIGNUP_WELCOME);
            Ok(Redirect::to("/listings"))
        }
        Err(AuthError::Duplicate(message)) | Err(AuthError::Invalid(message)) => {
            session.push_flash(FlashKind::Error, message);
            Ok(Redirect::to("/signup"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn login_form(State(state): State<AppState>, context: RequestContext) -> Result<Html<String>> {
    state.templates.page("users/login.html", &context.view())
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(request): Form<LoginRequest>,
) -> Result<Redirect> {
    let principal = match state.auth.authenticate(&request.username, &request.password).await {
        Ok(principal) => principal,
        Err(AuthError::NotFound) | Err(AuthError::BadCredential) => {
            session.push_flash(FlashKind::Error, LOGIN_FAILED);
            return Ok(Redirect::to("/login"));
        }
        Err(e) => return Err(e.into()),
    };

    state.auth.login(&session, &principal)?;
    info!(user_id = principal.id, "user logged in");
    session.push_flash(FlashKind::Success, LOGIN_WELCOME);

    let target = session
        .take::<String>(REDIRECT_KEY)
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| "/listings".to_string());

    Ok(Redirect::to(&target))
}

async fn logout(State(state): State<AppState>, session: Session) -> Redirect {
    state.auth.logout(&session);
    session.push_flash(FlashKind::Success, LOGGED_OUT);
    Redirect::to("/listings")
}
