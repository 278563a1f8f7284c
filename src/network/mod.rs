//! gRPC server bootstrap for the registry bridge.
//!
//! Serves the [`ServiceRegistry`] RPC service plus a standard gRPC health
//! service, with compression and keepalive tuning from [`NetworkConfig`],
//! and shuts down gracefully on the watch channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tonic::codec::CompressionEncoding;
use tonic_health::server::health_reporter;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::config::NetworkConfig;
use crate::errors::Error;
use crate::errors::Result;
use crate::proto::registry::service_registry_server::ServiceRegistryServer;
use crate::registry::RegistryBridge;

pub async fn start_rpc_server(
    bridge: Arc<RegistryBridge>,
    listen_address: SocketAddr,
    config: &NetworkConfig,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<ServiceRegistryServer<RegistryBridge>>()
        .await;

    let mut server_builder = tonic::transport::Server::builder()
        .concurrency_limit_per_connection(config.concurrency_limit)
        .tcp_keepalive(Some(Duration::from_secs(config.tcp_keepalive_in_secs)))
        .http2_keepalive_interval(Some(Duration::from_secs(
            config.http2_keep_alive_interval_in_secs,
        )))
        .http2_keepalive_timeout(Some(Duration::from_secs(
            config.http2_keep_alive_timeout_in_secs,
        )))
        .tcp_nodelay(config.tcp_nodelay);

    if let Err(e) = server_builder
        .add_service(health_service)
        .add_service(
            ServiceRegistryServer::from_arc(bridge)
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
        )
        .serve_with_shutdown(
            listen_address,
            shutdown_signal.changed().map(|_s| {
                warn!("Stopping RPC server. {}", listen_address);
            }),
        )
        .await
    {
        error!("error to start registry rpc server: {:?}.", e);
        return Err(Error::Fatal(format!("rpc server failed: {}", e)));
    }
    debug!("rpc service finished!");
    Ok(())
}
