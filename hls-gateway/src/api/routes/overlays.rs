//! Overlay CRUD routes.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    MessageResponse, OverlayCreatedResponse, OverlayListResponse, OverlayResponse, STATUS_SUCCESS,
};
use crate::api::routes::json_object;
use crate::api::server::AppState;
use crate::database::models::{NewOverlay, OverlayPatch};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_overlays).post(create_overlay))
        .route(
            "/{id}",
            get(get_overlay).put(update_overlay).delete(delete_overlay),
        )
}

async fn create_overlay(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OverlayCreatedResponse>)> {
    let body = json_object(payload)?;
    let overlay: NewOverlay = serde_json::from_value(Value::Object(body))
        .map_err(|e| ApiError::validation(format!("Invalid overlay: {}", e)))?;

    let row = state.overlay_repository.create(overlay).await?;
    tracing::info!(overlay_id = %row.id, "Overlay created");

    Ok((
        StatusCode::CREATED,
        Json(OverlayCreatedResponse {
            id: row.id,
            message: "Overlay created successfully".to_string(),
            status: STATUS_SUCCESS.to_string(),
        }),
    ))
}

async fn list_overlays(State(state): State<AppState>) -> ApiResult<Json<OverlayListResponse>> {
    let overlays = state
        .overlay_repository
        .list_active()
        .await?
        .iter()
        .map(|row| row.to_overlay())
        .collect::<crate::Result<Vec<_>>>()?;

    Ok(Json(OverlayListResponse {
        count: overlays.len(),
        overlays,
        status: STATUS_SUCCESS.to_string(),
    }))
}

async fn get_overlay(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OverlayResponse>> {
    let overlay = state.overlay_repository.get(&id).await?.to_overlay()?;
    Ok(Json(OverlayResponse {
        overlay,
        status: STATUS_SUCCESS.to_string(),
    }))
}

async fn update_overlay(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let body = json_object(payload)?;
    let patch: OverlayPatch = serde_json::from_value(Value::Object(body))
        .map_err(|e| ApiError::validation(format!("Invalid overlay update: {}", e)))?;

    state.overlay_repository.update(&id, patch).await?;
    tracing::info!(overlay_id = %id, "Overlay updated");

    Ok(Json(MessageResponse::success("Overlay updated successfully")))
}

async fn delete_overlay(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.overlay_repository.delete(&id).await?;
    tracing::info!(overlay_id = %id, "Overlay deleted");

    Ok(Json(MessageResponse::success("Overlay deleted successfully")))
}
