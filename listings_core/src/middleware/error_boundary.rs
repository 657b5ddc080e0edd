//! Terminal error handling.
//!
//! Every error response coming back from the router is rendered through the
//! `error.html` view. Handlers describe failures with [`AppError`], which
//! leaves an [`ErrorReport`] in the response extensions; error responses
//! without one (405s, extractor rejections) get a report derived from their
//! status.

use std::any::Any;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::error::{AppError, ErrorKind, ErrorReport};
use crate::middleware::auth::CurrentUser;
use crate::session::PendingFlash;
use crate::views::{RequestContext, TemplateEngine};
use crate::AppState;

pub async fn error_boundary(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let current_user = request.extensions().get::<CurrentUser>().cloned();
    let pending_flash = request.extensions().get::<PendingFlash>().cloned();
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let report = match response.extensions().get::<ErrorReport>() {
        Some(report) => report.clone(),
        None if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED => {
            ErrorReport::not_found()
        }
        None => ErrorReport::from_status(status),
    };

    if report.kind == ErrorKind::Routing {
        warn!(status = report.status.as_u16(), "no route matched");
    }

    let context = RequestContext {
        current_user: current_user.and_then(|user| user.0),
        flash: pending_flash.map(|pending| pending.take()).unwrap_or_default(),
    };
    render_error(&state.templates, &context, report)
}

/// Renders the error view. Falls back to a plain-text body with the same
/// status when the view cannot be rendered.
pub fn render_error(templates: &TemplateEngine, context: &RequestContext, report: ErrorReport) -> Response {
    let mut view = context.view();
    view.insert("status", &report.status.as_u16());
    view.insert("message", &report.message);

    let mut response = match templates.page("error.html", &view) {
        Ok(page) => (report.status, page).into_response(),
        Err(e) => {
            error!(error = %e, status = report.status.as_u16(), "failed to render error page");
            (report.status, report.message.clone()).into_response()
        }
    };

    response.extensions_mut().insert(report);
    response
}

/// Turns a handler panic into an unclassified error.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    error!(panic = %detail, "handler panicked");
    AppError::InternalServerError.into_response()
}
