//! Listing pages mounted under `/listings`.

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    middleware,
    response::{Html, Redirect},
    routing::get,
    Router,
};
use tracing::info;

use crate::database::NewListing;
use crate::error::{AppError, Result};
use crate::middleware::{require_login, AuthUser};
use crate::session::{FlashKind, Session};
use crate::views::RequestContext;
use crate::AppState;

pub const LISTING_CREATED: &str = "New Listing Created!";
pub const LISTING_MISSING: &str = "Listing you requested for does not exist!";

/// Guards are attached per method route. A router-wide `route_layer` would
/// also wrap the 405 fallback. `create` is guarded by [`AuthUser`].
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/new", get(new_form).route_layer(middleware::from_fn(require_login)))
        .route("/:id", get(show))
}

/// Parses a listing id from the path.
pub fn parse_listing_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::domain(StatusCode::BAD_REQUEST, "Invalid listing id"))
}

async fn index(State(state): State<AppState>, context: RequestContext) -> Result<Html<String>> {
    let listings = state.listings.list().await?;

    let mut view = context.view();
    view.insert("listings", &listings);
    state.templates.page("listings/index.html", &view)
}

async fn new_form(State(state): State<AppState>, context: RequestContext) -> Result<Html<String>> {
    state.templates.page("listings/new.html", &context.view())
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
    Form(form): Form<NewListing>,
) -> Result<Redirect> {
    let input = form.validate()?;
    let listing = state.listings.create(&input, user.id).await?;

    info!(listing_id = listing.id, owner_id = user.id, "listing created");
    session.push_flash(FlashKind::Success, LISTING_CREATED);
    Ok(Redirect::to("/listings"))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    context: RequestContext,
) -> Result<Html<String>> {
    let id = parse_listing_id(&id)?;
    let listing = state
        .listings
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::domain(StatusCode::NOT_FOUND, LISTING_MISSING))?;
    let reviews = state.reviews.list_for_listing(id).await?;

    let mut view = context.view();
    view.insert("listing", &listing);
    view.insert("reviews", &reviews);
    state.templates.page("listings/show.html", &view)
}
