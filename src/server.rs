//! HTTP server lifecycle

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::routes::{create_router, AppState, RouterConfig};

/// Serve the API on `listener` until Ctrl-C or SIGTERM
pub async fn run(
    listener: TcpListener,
    state: AppState,
    config: RouterConfig,
) -> std::io::Result<()> {
    let app = create_router(state, &config);

    info!("Claw-X API listening on http://{}", listener.local_addr()?);
    if let Some(ref dir) = config.static_dir {
        info!("Serving frontend from {}", dir.display());
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
