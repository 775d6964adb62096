//! API route modules.

pub mod health;
pub mod overlays;
pub mod settings;
pub mod streams;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use serde_json::{Map, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/streams", streams::router())
        .nest("/api/overlays", overlays::router())
        .nest("/api/settings", settings::router())
        .nest("/api/health", health::router())
        .with_state(state)
}

/// Unwrap a JSON body that must be a non-empty object.
pub(crate) fn json_object(payload: Result<Json<Value>, JsonRejection>) -> ApiResult<Map<String, Value>> {
    match payload {
        Ok(Json(Value::Object(map))) if !map.is_empty() => Ok(map),
        Ok(_) => Err(ApiError::bad_request("No JSON data provided")),
        Err(rejection) => {
            tracing::debug!("Rejected request body: {}", rejection);
            Err(ApiError::bad_request("No JSON data provided"))
        }
    }
}
