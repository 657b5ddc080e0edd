//! Main entry point for the listings server binary

use anyhow::Result;
use listings_core::{
    connect_database, create_app, lazy_database_pool, run_migrations, run_server, AppConfig,
    AppState, SqliteSessionStore,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let pool = match connect_database(&config.database).await {
        Ok(pool) => {
            info!("connected to db");
            if config.database.migrate_on_start {
                if let Err(e) = run_migrations(pool.clone()).await {
                    error!("Failed to run database migrations: {}", e);
                    if config.database.require_on_start {
                        return Err(anyhow::anyhow!("Failed to run database migrations: {}", e));
                    }
                }
            }
            pool
        }
        Err(e) if config.database.require_on_start => {
            return Err(anyhow::anyhow!("Failed to connect to database: {}", e));
        }
        Err(e) => {
            warn!("Failed to connect to database, serving with degraded storage: {}", e);
            lazy_database_pool(&config.database)
                .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?
        }
    };

    spawn_session_pruning(
        SqliteSessionStore::from_config(pool.clone(), &config.session),
        Duration::from_secs(config.session.prune_interval_seconds),
    );

    let state = AppState::new(Arc::new(config), pool)
        .map_err(|e| anyhow::anyhow!("Failed to initialize application state: {}", e))?;
    info!("App: {} v{}", state.app_name, state.version);

    let app = create_app(state);

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn spawn_session_pruning(store: SqliteSessionStore, every: Duration) {
    if every.is_zero() {
        info!("Session pruning disabled");
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match store.prune_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "pruned expired sessions"),
                Err(e) => warn!(error = %e, "failed to prune expired sessions"),
            }
        }
    });
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };

        format!(
            "listings_core={level},listings_server={level},server={level},tower_http={level},sqlx=warn",
            level = default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
