//! Graceful-shutdown signal handling.
//!
//! Binaries wait on [`wait_for_signal`] (or pass it to axum's
//! `with_graceful_shutdown`), then broadcast shutdown to their worker tasks.

/// Resolve when the process receives SIGINT or SIGTERM.
///
/// # Panics
///
/// Panics if the signal handlers cannot be installed, which only happens
/// when the process is out of kernel resources at startup.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
