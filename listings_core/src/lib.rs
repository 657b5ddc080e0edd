//! Core library of the listings server: session-backed authentication, flash
//! messages, server-rendered views and the middleware pipeline tying them
//! together.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod session;
pub mod views;

pub use auth::{AuthError, AuthService, UserPrincipal, UserRepository, UserRepositoryTrait};
pub use config::AppConfig;
pub use database::{
    connect_database, get_database_pool, lazy_database_pool, run_migrations, DatabaseManager,
    ListingRepository, ReviewRepository,
};
pub use error::{AppError, ErrorKind, ErrorReport, Result};
pub use handlers::routes::create_routes;
pub use session::{Session, SessionCookie, SessionManager, SessionStore, SqliteSessionStore};
pub use views::{RequestContext, TemplateEngine};

use axum::{handler::HandlerWithoutStateExt, middleware as axum_middleware, Router};
use sqlx::SqlitePool;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub config: Arc<AppConfig>,
    pub db_manager: DatabaseManager,
    pub sessions: SessionManager,
    pub auth: AuthService,
    pub templates: Arc<TemplateEngine>,
    pub listings: ListingRepository,
    pub reviews: ReviewRepository,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, pool: SqlitePool) -> Result<Self> {
        let cookie = SessionCookie::new(
            config.session.cookie_name.clone(),
            &config.session.secret,
            config.session_max_age(),
            config.session.secure_cookie,
        );

        let store = SqliteSessionStore::from_config(pool.clone(), &config.session);
        let templates = TemplateEngine::new(&config.templates)?;
        let auth = AuthService::new(
            UserRepository::new(pool.clone()),
            config.auth.password_min_length,
        );

        Ok(Self {
            app_name: "Wanderlust".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            db_manager: DatabaseManager::new(pool.clone()),
            sessions: SessionManager::new(Arc::new(store), cookie),
            auth,
            templates: Arc::new(templates),
            listings: ListingRepository::new(pool.clone()),
            reviews: ReviewRepository::new(pool),
            config,
        })
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        let cookie = self.sessions.cookie().clone();
        self.sessions = SessionManager::new(store, cookie);
        self
    }

    pub fn with_templates(mut self, templates: TemplateEngine) -> Self {
        self.templates = Arc::new(templates);
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    create_app_with_routes(state, create_routes())
}

/// Wraps `routes` in the request pipeline. Layers run outermost first:
/// tracing, session, flash, auth, error boundary, panic catcher.
pub fn create_app_with_routes(state: AppState, routes: Router<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.server.public_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(handle_not_found.into_service());

    routes
        .fallback_service(static_files)
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::error_boundary,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum_middleware::from_fn(session::flash_middleware))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .layer(middleware::logging_layer())
        .with_state(state)
}

async fn handle_not_found() -> AppError {
    AppError::RouteNotFound
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind {}: {}", addr, e);
        AppError::from(e)
    })?;
    info!("server is listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
