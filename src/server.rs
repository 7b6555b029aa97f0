use std::sync::Arc;

use tokio::net::TcpListener;

use crate::api::{self, Gateway, SharedGateway};
use crate::config::Settings;
use crate::error::CapiError;
use crate::tool::{Cbsd, ProcessRunner, ToolRunner};

/// Bind, warm the inventory, and serve until SIGTERM or Ctrl-C.
pub async fn run_serve(settings: &Settings) -> Result<(), CapiError> {
    let runner: Arc<dyn ToolRunner> = Arc::new(ProcessRunner);
    let gateway = Arc::new(Gateway::new(runner, Cbsd::new(settings.cbsd.as_str())));

    let listener = TcpListener::bind(&settings.listen)
        .await
        .map_err(|e| CapiError::Io {
            context: format!("binding {}", settings.listen),
            source: e,
        })?;

    if settings.initial_sync {
        warm_inventory(&gateway).await;
    }

    serve(listener, gateway, shutdown_signal()).await
}

/// Serve the API on an already bound listener until `shutdown` resolves.
/// Dispatched cbsd tasks are detached and are not waited for.
pub async fn serve(
    listener: TcpListener,
    gateway: SharedGateway,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), CapiError> {
    let addr = listener.local_addr().map_err(|e| CapiError::Io {
        context: "reading listener address".into(),
        source: e,
    })?;
    tracing::info!(%addr, "capi listening");

    axum::serve(listener, api::router(gateway))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CapiError::Io {
            context: "serving HTTP".into(),
            source: e,
        })?;

    tracing::info!("capi exited");
    Ok(())
}

/// A failed startup listing leaves the cache empty; `blist` retries later.
async fn warm_inventory(gateway: &Gateway) {
    match gateway.inventory.sync().await {
        Ok(snapshot) => tracing::info!(vms = snapshot.len(), "initial inventory loaded"),
        Err(e) => tracing::warn!("initial inventory sync failed: {e}"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl-C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
