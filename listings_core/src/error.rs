//! Application error types and the report consumed by the error boundary

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::AuthError;
use crate::session::StoreError;

pub type Result<T> = std::result::Result<T, AppError>;

pub const NOT_FOUND_MESSAGE: &str = "Page Not Found!";
pub const GENERIC_MESSAGE: &str = "Something went wrong!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No handler matched the request.
    Routing,
    /// Raised by a handler with a status and message meant for the visitor.
    Domain,
    /// Anything else. Rendered as a 500 with the generic message.
    Unclassified,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No route matched the request")]
    RouteNotFound,

    #[error("{status}: {message}")]
    Domain { status: StatusCode, message: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    InternalServerError,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Status and visitor-facing message of a failed request.
///
/// `AppError::into_response` stores one of these in the response extensions so
/// the error boundary can render the error view without re-inspecting the
/// original error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(ErrorKind::Routing, StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
    }

    pub fn generic() -> Self {
        Self::new(
            ErrorKind::Unclassified,
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERIC_MESSAGE,
        )
    }

    /// Report for an error response produced outside our handlers, such as an
    /// extractor rejection.
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            return Self::new(ErrorKind::Unclassified, status, GENERIC_MESSAGE);
        }
        let message = status.canonical_reason().unwrap_or(GENERIC_MESSAGE);
        Self::new(ErrorKind::Domain, status, message)
    }
}

impl AppError {
    pub fn domain(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Domain {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::RouteNotFound => ErrorKind::Routing,
            AppError::Domain { .. } | AppError::BadRequest(_) | AppError::NotFound(_) => {
                ErrorKind::Domain
            }
            _ => ErrorKind::Unclassified,
        }
    }

    pub fn report(&self) -> ErrorReport {
        match self {
            AppError::RouteNotFound => ErrorReport::not_found(),
            AppError::Domain { status, message } => {
                ErrorReport::new(ErrorKind::Domain, *status, message.clone())
            }
            AppError::BadRequest(msg) => {
                ErrorReport::new(ErrorKind::Domain, StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::NotFound(msg) => {
                ErrorReport::new(ErrorKind::Domain, StatusCode::NOT_FOUND, msg.clone())
            }
            _ => ErrorReport::generic(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.kind() == ErrorKind::Unclassified {
            tracing::error!(error = ?self, "Unhandled error");
        }

        let report = self.report();
        let mut response = (report.status, report.message.clone()).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::BadRequest("Resource already exists".to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        AppError::Template(message)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound | AuthError::BadCredential => {
                AppError::domain(StatusCode::UNAUTHORIZED, "Invalid username or password")
            }
            AuthError::Duplicate(msg) | AuthError::Invalid(msg) => AppError::BadRequest(msg),
            AuthError::Hash(msg) => AppError::Other(anyhow::anyhow!("password hashing failed: {}", msg)),
            AuthError::Store(msg) => AppError::Database(msg),
        }
    }
}
