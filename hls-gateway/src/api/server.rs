//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::Request;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::config::{CorsOrigins, GatewayConfig};
use crate::database::DbPool;
use crate::database::repositories::{
    OverlayRepository, SettingsRepository, SqlxOverlayRepository, SqlxSettingsRepository,
};
use crate::error::Result;
use crate::stream::StreamRegistry;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    pub cors_origins: CorsOrigins,
    /// Request body size limit in bytes
    pub body_limit: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for ApiServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.port,
            cors_origins: config.cors_origins.clone(),
            body_limit: config.body_limit,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub registry: Arc<StreamRegistry>,
    /// Pool used for health pings
    pub pool: DbPool,
    pub overlay_repository: Arc<dyn OverlayRepository>,
    pub settings_repository: Arc<dyn SettingsRepository>,
    /// Upper bound on waiting for a new stream's playlist
    pub playlist_wait: Duration,
}

impl AppState {
    pub fn new(registry: Arc<StreamRegistry>, pool: DbPool, playlist_wait: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            registry,
            overlay_repository: Arc::new(SqlxOverlayRepository::new(pool.clone())),
            settings_repository: Arc::new(SqlxSettingsRepository::new(pool.clone())),
            pool,
            playlist_wait,
        }
    }
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the full router: routes, body limit, CORS and request tracing.
pub fn build_router(config: &ApiServerConfig, state: AppState) -> Router {
    routes::create_router(state)
        .layer(RequestBodyLimitLayer::new(config.body_limit))
        .layer(cors_layer(&config.cors_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if is_health_probe(req) {
                        Span::none()
                    } else {
                        tracing::info_span!(
                            "http_request",
                            method = %req.method(),
                            uri = %req.uri(),
                        )
                    }
                })
                .on_request(|_req: &Request, span: &Span| {
                    if !span.is_disabled() {
                        tracing::debug!(parent: span, "started processing request");
                    }
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if !span.is_disabled() {
                            tracing::info!(
                                parent: span,
                                status = res.status().as_u16(),
                                latency_ms = latency.as_millis() as u64,
                                "finished processing request"
                            );
                        }
                    },
                )
                .on_failure(
                    |class: tower_http::classify::ServerErrorsFailureClass,
                     latency: Duration,
                     span: &Span| {
                        if !span.is_disabled() {
                            tracing::error!(
                                parent: span,
                                classification = %class,
                                latency_ms = latency.as_millis() as u64,
                                "request failed"
                            );
                        }
                    },
                ),
        )
}

fn is_health_probe(req: &Request) -> bool {
    req.uri().path().starts_with("/api/health")
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Serve until the cancellation token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| crate::error::Error::ApiError(format!("Invalid address: {}", e)))?;

        let router = build_router(&self.config, self.state.clone());
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| crate::error::Error::ApiError(format!("Server error: {}", e)))?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
