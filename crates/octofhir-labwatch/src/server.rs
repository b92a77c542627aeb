use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use octofhir_auth::{KeyStore, jwks_router};

/// Serves the public JWKS until `shutdown` resolves.
pub async fn serve_jwks<F>(
    addr: SocketAddr,
    key_store: Arc<KeyStore>,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %addr,
        keys = key_store.len(),
        "JWKS endpoint listening on /jwks"
    );
    axum::serve(listener, jwks_router(key_store))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl+C.
pub async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
