use anyhow::Context;
use application::GatewayApp;
use config::Config;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(
                    "torrent_gateway=debug,api_server=debug,application=debug,domain=debug,infrastructure=debug,security=warn,tower_http=debug",
                )),
        )
        .init();

    info!("🚀 Starting torrent gateway");

    let config = Config::from_env().context("invalid configuration")?;
    config.log_summary();

    let app = Arc::new(GatewayApp::new(&config)?);

    // The daemon may still be starting; requests log in lazily.
    if let Err(e) = app.connect().await {
        warn!("⚠️ Engine not reachable yet: {}", e);
    }

    let listener = tokio::net::TcpListener::bind(config.api_address())
        .await
        .with_context(|| format!("failed to bind {}", config.api_address()))?;

    api_server::serve(listener, app.clone(), shutdown_signal()).await?;

    info!("👋 Shutting down torrent gateway");
    app.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
