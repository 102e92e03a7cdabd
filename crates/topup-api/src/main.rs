//! # topup-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the top-up rules API.
//! Binds to configurable port (default 8080).

use metrics_exporter_prometheus::PrometheusBuilder;
use topup_api::state::{AppConfig, AppState, LogFormat};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration decides the log format, so it is read first.
    let config = AppConfig::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(?config, "configuration loaded");

    let metrics_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        tracing::error!("Prometheus recorder installation failed: {e}");
        e
    })?;

    let db_pool = topup_api::db::init_pool(&config).await.map_err(|e| {
        tracing::error!("database initialization failed: {e}");
        e
    })?;

    let port = config.port;
    let state = match db_pool {
        Some(pool) => AppState::with_pool(config, pool),
        None => AppState::with_config(config),
    }
    .with_metrics(metrics_handle);

    let app = topup_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("top-up rules API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
