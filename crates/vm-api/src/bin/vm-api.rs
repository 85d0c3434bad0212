//! RancherVM administrative API server.

use reconcile_runtime::shutdown_on_ctrl_c;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vm_api::{router, ApiConfig, AppState, KubeApiStore, ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ApiConfig::from_env()?;

    info!("Configuration:");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Namespace: {}", config.namespace);

    let client = kube::Client::try_default().await?;
    let store = KubeApiStore::new(client, &config.namespace);
    let app = router(AppState::new(Arc::new(store)));

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("Starting http server listening on {}", config.listen_addr);

    let shutdown = shutdown_on_ctrl_c();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("API server stopped");
    Ok(())
}
