//! Middleware components of the request pipeline

pub mod auth;
pub mod current_user;
pub mod error_boundary;
pub mod logging;

pub use auth::{auth_middleware, require_login, CurrentUser, LOGIN_REQUIRED_MESSAGE, REDIRECT_KEY};
pub use current_user::AuthUser;
pub use error_boundary::{error_boundary, handle_panic, render_error};
pub use logging::logging_layer;
