use std::net::SocketAddr;
use std::sync::Arc;

use mesh_registry::metrics;
use mesh_registry::start_rpc_server;
use mesh_registry::Error;
use mesh_registry::MemoryStore;
use mesh_registry::RegistryBridge;
use mesh_registry::Result;
use mesh_registry::Settings;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    // Initializing Logs
    init_observability();

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());
    let shutdown = CancellationToken::new();

    // Standalone mode runs over the in-memory store; embedding against a
    // real resource-store client replaces this handle.
    let store = Arc::new(MemoryStore::new());
    let bridge = Arc::new(RegistryBridge::new(
        settings.bridge.namespace.clone(),
        store,
        shutdown.clone(),
    ));

    if settings.monitoring.prometheus_enabled {
        tokio::spawn(metrics::start_server(
            settings.monitoring.prometheus_port,
            graceful_rx.clone(),
        ));
    }

    info!(
        namespace = %settings.bridge.namespace,
        listen_address = %settings.bridge.listen_address,
        "Registry bridge started. Waiting for CTRL+C signal..."
    );
    // Listen on Shutdown Signal
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(graceful_tx, shutdown).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    let listen_address: SocketAddr = settings.bridge.listen_address.parse().map_err(|e| {
        Error::InvalidConfig(format!(
            "bad listen_address {}: {}",
            settings.bridge.listen_address, e
        ))
    })?;
    if let Err(e) = start_rpc_server(bridge, listen_address, &settings.network, graceful_rx).await {
        error!("rpc server stops: {:?}", e);
    }

    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(
    graceful_tx: watch::Sender<()>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("signal: {}", e)))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("signal: {}", e)))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }

    // stop the change pipeline and all watch streams first, then the
    // listeners
    shutdown.cancel();
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
