//! Reviews mounted under `/listings/:id/reviews`.

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::Redirect,
    routing::post,
    Router,
};
use tracing::info;

use crate::database::NewReview;
use crate::error::{AppError, Result};
use crate::handlers::listings::{parse_listing_id, LISTING_MISSING};
use crate::middleware::AuthUser;
use crate::session::{FlashKind, Session};
use crate::AppState;

pub const REVIEW_CREATED: &str = "New Review Created!";

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(create))
}

async fn create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AuthUser(user): AuthUser,
    session: Session,
    Form(form): Form<NewReview>,
) -> Result<Redirect> {
    let listing_id = parse_listing_id(&id)?;
    let input = form.validate()?;

    if state.listings.get_by_id(listing_id).await?.is_none() {
        return Err(AppError::domain(StatusCode::NOT_FOUND, LISTING_MISSING));
    }

    let review = state.reviews.create(listing_id, &input, user.id).await?;
    info!(review_id = review.id, listing_id, "review created");

    session.push_flash(FlashKind::Success, REVIEW_CREATED);
    Ok(Redirect::to(&format!("/listings/{}", listing_id)))
}
