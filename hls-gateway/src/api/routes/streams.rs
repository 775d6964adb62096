//! Stream control and HLS playback routes.

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, Request, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;
use tower_http::services::ServeFile;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    MessageResponse, STATUS_SUCCESS, StartStreamRequest, StartStreamResponse,
    StopStreamRequest, StreamStatusResponse,
};
use crate::api::routes::json_object;
use crate::api::server::AppState;
use crate::stream::{PLAYLIST_FILE, playlist_url_for, wait_for_file};
use crate::utils::url::validate_source_url;

/// Interval between playlist readiness checks after a start.
const PLAYLIST_POLL_INTERVAL: Duration = Duration::from_millis(500);

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_stream))
        .route("/stop", post(stop_stream))
        .route("/status", get(stream_status))
        .route("/{stream_id}/{file}", get(get_artifact))
}

async fn start_stream(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<StartStreamResponse>> {
    let body = json_object(payload)?;
    let request: StartStreamRequest = serde_json::from_value(Value::Object(body))
        .map_err(|e| ApiError::validation(format!("Invalid request: {}", e)))?;

    let rtsp_url = request
        .rtsp_url
        .map(|url| url.trim().to_string())
        .unwrap_or_default();
    validate_source_url(&rtsp_url).map_err(ApiError::validation)?;

    let stream_id = request.stream_id;
    let snapshot = state.registry.start(&stream_id, &rtsp_url).await?;

    // Give the transcoder a moment to write its first playlist so clients
    // do not immediately hit a 404.
    let playlist = snapshot.playlist_path();
    if !wait_for_file(&playlist, state.playlist_wait, PLAYLIST_POLL_INTERVAL).await {
        tracing::warn!(
            stream_id = %stream_id,
            wait_secs = state.playlist_wait.as_secs(),
            "Playlist not ready"
        );
    }

    let playlist_url = playlist_url_for(&state.registry.config().playlist_url_prefix, &stream_id);
    tracing::info!(stream_id = %stream_id, source = %rtsp_url, "Stream started");

    Ok(Json(StartStreamResponse {
        message: "Stream started successfully".to_string(),
        playlist_url,
        stream_id,
        status: STATUS_SUCCESS.to_string(),
    }))
}

async fn stop_stream(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    // A missing body stops the default stream.
    let request = match payload {
        Ok(Json(value)) if !value.is_null() => serde_json::from_value::<StopStreamRequest>(value)
            .map_err(|e| ApiError::validation(format!("Invalid request: {}", e)))?,
        _ => StopStreamRequest::default(),
    };

    state.registry.stop(&request.stream_id).await.map_err(|e| match e {
        crate::Error::NotFound { .. } => ApiError::not_found("Stream not found or already stopped"),
        other => ApiError::from(other),
    })?;

    Ok(Json(MessageResponse::success("Stream stopped successfully")))
}

async fn stream_status(State(state): State<AppState>) -> Json<StreamStatusResponse> {
    let active_streams = state.registry.list_active();
    Json(StreamStatusResponse {
        total_streams: active_streams.len(),
        active_streams,
        status: STATUS_SUCCESS.to_string(),
    })
}

/// Serve a playlist or segment, from the live stream or what is left on disk.
async fn get_artifact(
    State(state): State<AppState>,
    Path((stream_id, file)): Path<(String, String)>,
) -> ApiResult<Response> {
    let is_playlist = file == PLAYLIST_FILE;

    let Some(path) = state.registry.resolve_artifact(&stream_id, &file).await else {
        return Err(if is_playlist {
            tracing::warn!(stream_id = %stream_id, "Playlist not found");
            ApiError::not_found("Playlist not available. Stream may not be ready yet.")
        } else {
            ApiError::not_found("Segment not found")
        });
    };

    let content_type = if is_playlist {
        PLAYLIST_CONTENT_TYPE
    } else {
        SEGMENT_CONTENT_TYPE
    };
    serve_file(path, content_type, is_playlist).await
}

async fn serve_file(path: PathBuf, content_type: &'static str, no_cache: bool) -> ApiResult<Response> {
    let req = Request::builder()
        .body(Body::empty())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let mut response = match ServeFile::new(&path).try_call(req).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(path = %path.display(), "Failed to serve file: {}", e);
            return Err(ApiError::internal("Error serving file"));
        }
    };

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if no_cache {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use crate::api::routes::create_router;
    use crate::api::routes::test_support::{body_json, get, json_request, state};
    use crate::utils::fs;
    use axum::http::{StatusCode, header};
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_start_requires_body_and_url() {
        let temp = TempDir::new().unwrap();
        let app = create_router(state(&temp).await);

        let response = app
            .clone()
            .oneshot(get("/api/streams/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/streams/start", json!({"stream_id": "cam1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "RTSP URL is required");

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/streams/start")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_start_rejects_bad_scheme() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp).await;
        let registry = state.registry.clone();
        let app = create_router(state);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/streams/start",
                json!({"rtsp_url": "ftp://bad", "stream_id": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
        assert!(registry.lookup("x").is_none());
        assert!(!fs::is_dir(&registry.artifact_dir("x")).await);
    }

    #[tokio::test]
    async fn test_start_rejects_traversal_stream_id() {
        let temp = TempDir::new().unwrap();
        let app = create_router(state(&temp).await);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/streams/start",
                json!({"rtsp_url": "rtsp://host/feed", "stream_id": ".."}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_internal_error() {
        let temp = TempDir::new().unwrap();
        let app = create_router(state(&temp).await);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/streams/start",
                json!({"rtsp_url": "rtsp://host/feed", "stream_id": "cam1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(!body["message"].as_str().unwrap().contains("nonexistent"));
    }

    #[tokio::test]
    async fn test_stop_unknown_stream_is_not_found() {
        let temp = TempDir::new().unwrap();
        let app = create_router(state(&temp).await);

        let response = app
            .oneshot(json_request("POST", "/api/streams/stop", json!({"stream_id": "ghost"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_serves_leftover_artifacts_with_content_types() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp).await;
        let dir = state.registry.artifact_dir("old");
        fs::ensure_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("playlist.m3u8"), b"#EXTM3U\n")
            .await
            .unwrap();
        tokio::fs::write(dir.join("segment_000.ts"), b"\x47").await.unwrap();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(get("/api/streams/old/playlist.m3u8"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/vnd.apple.mpegurl"
        );

        let response = app
            .clone()
            .oneshot(get("/api/streams/old/segment_000.ts"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "video/MP2T"
        );

        let response = app
            .clone()
            .oneshot(get("/api/streams/old/segment_999.ts"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(get("/api/streams/old/..%2F..%2Fsecret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
