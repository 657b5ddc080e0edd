//! Route table of the application

use axum::{routing::get, Router};

use crate::handlers::{health, listings, reviews, users};
use crate::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::handle_health))
        .nest("/listings", listings::routes())
        .nest("/listings/:id/reviews", reviews::routes())
        .merge(users::routes())
}
