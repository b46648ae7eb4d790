use std::future::Future;

use tokio::signal;
use tracing::error;

/// Future that resolves on ctrl-c or SIGTERM.
///
/// The SIGTERM listener is installed when this is called, not when the future is first
/// polled. A listener that cannot be installed is logged and never fires.
pub fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(err) => {
            error!(error = %err, "cannot listen for SIGTERM");
            None
        }
    };

    async move {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                error!(error = %err, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match sigterm {
                Some(mut sigterm) => {
                    sigterm.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }
}
