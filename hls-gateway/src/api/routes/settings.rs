//! Application settings routes.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};
use serde_json::Value;

use crate::api::error::ApiResult;
use crate::api::models::{MessageResponse, STATUS_SUCCESS, SettingsResponse};
use crate::api::routes::json_object;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).post(update_settings))
}

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<SettingsResponse>> {
    let settings = state.settings_repository.get().await?;
    Ok(Json(SettingsResponse {
        settings,
        status: STATUS_SUCCESS.to_string(),
    }))
}

async fn update_settings(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let patch = json_object(payload)?;
    state.settings_repository.update(&patch).await?;

    tracing::info!("Application settings updated");
    Ok(Json(MessageResponse::success("Settings updated successfully")))
}
