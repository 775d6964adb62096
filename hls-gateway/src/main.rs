use std::sync::Arc;

use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use hls_gateway::api::{ApiServer, ApiServerConfig, AppState};
use hls_gateway::config::GatewayConfig;
use hls_gateway::stream::StreamRegistry;
use hls_gateway::{database, logging, panic_hook};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = GatewayConfig::from_env_or_default();

    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir)?;
    panic_hook::install(logging_config.log_dir());
    let background = CancellationToken::new();
    logging_config.start_retention_cleanup(background.clone());
    info!(filter = %logging_config.filter(), "Logging initialized");

    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let registry = Arc::new(StreamRegistry::new(config.registry.clone()).await?);
    info!(
        output_root = %config.registry.output_root.display(),
        transcoder = %config.registry.transcoder_path,
        "Stream registry ready"
    );

    let state = AppState::new(registry.clone(), pool.clone(), config.playlist_wait);
    let server = ApiServer::new(ApiServerConfig::from(&config), state);

    let server_token = server.cancel_token();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown signal received");
        server_token.cancel();
    });

    if let Err(e) = server.run().await {
        error!("API server error: {}", e);
    }

    registry.shutdown().await;
    background.cancel();
    pool.close().await;
    info!("hls-gateway stopped");

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
