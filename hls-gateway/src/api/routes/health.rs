//! Health check route.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use chrono::Utc;

use crate::api::models::HealthResponse;
use crate::api::server::AppState;
use crate::database;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

/// Report database reachability and the number of supervised streams.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status_code, status, database) = match database::ping(&state.pool).await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        database: database.to_string(),
        active_streams: state.registry.active_count(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        timestamp: Utc::now(),
    };

    (status_code, Json(response))
}
