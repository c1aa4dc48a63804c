use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use psr_server::{create_router, AppState, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let state = AppState::from_config(&config).with_context(|| {
        format!("failed to open upload folder {}", config.upload_folder.display())
    })?;

    info!(
        upload_folder = %config.upload_folder.display(),
        max_upload_mb = config.max_upload_size_mb,
        ttl_seconds = config.upload_ttl_seconds,
        "upload store ready"
    );

    let app = create_router(Arc::new(state));

    info!("Starting server on http://{}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;

    Ok(())
}
