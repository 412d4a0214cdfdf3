// Main entry point - Configuration, dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use biosignal_dashboard::infrastructure::config::load_config;
use biosignal_dashboard::presentation::app_state::AppState;
use biosignal_dashboard::presentation::router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    // Load configuration
    let config = load_config()?;

    // Create sources, services and session
    let state = Arc::new(AppState::from_config(&config)?);

    // Build router (presentation layer)
    let router = router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind_address))?;
    tracing::info!("Starting biosignal dashboard on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
