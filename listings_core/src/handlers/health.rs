//! Liveness endpoint

use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use tracing::warn;

/// Always 200 while the process is up; reports the database separately so a
/// lost database shows up as degraded rather than dead.
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let database_status = match state.db_manager.health_check().await {
        Ok(()) => "healthy",
        Err(e) => {
            warn!(error = %e, "database health check failed");
            "unhealthy"
        }
    };

    let status = if database_status == "healthy" { "healthy" } else { "degraded" };

    Json(serde_json::json!({
        "status": status,
        "app": state.app_name,
        "version": state.version,
        "database_status": database_status,
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}
