//! DNS server setup and lifecycle management.

use hickory_server::authority::Catalog;
use hickory_server::ServerFuture;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{DnsConfig, ProviderConfig};
use crate::error::DnsError;
use crate::handler::MeshDnsHandler;
use crate::metrics::Metrics;
use crate::provider::Refresher;
use crate::state::RecordStore;

/// Interval for emitting state metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically emit state metrics.
async fn metrics_loop(store: RecordStore, metrics: Metrics, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                store.emit_metrics(&metrics);
                debug!(hosts = store.len(), "emitted state metrics");
            }
            _ = shutdown.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// DNS server for the mesh zone.
pub struct DnsServer {
    dns: DnsConfig,
    provider: ProviderConfig,
    store: RecordStore,
    metrics: Metrics,
}

impl DnsServer {
    /// Create a new DNS server with the given configuration.
    pub fn new(dns: DnsConfig, provider: ProviderConfig) -> Self {
        let metrics = Metrics::new(dns.server_name.clone());
        Self {
            dns,
            provider,
            store: RecordStore::new(),
            metrics,
        }
    }

    /// Get a reference to the record store.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Build the request handler. Names this server does not own are passed
    /// to an empty catalog, which refuses them.
    pub fn handler(&self) -> Result<MeshDnsHandler, DnsError> {
        let handler = MeshDnsHandler::new(
            self.dns.zone_name()?,
            self.store.clone(),
            self.metrics.clone(),
        )
        .with_fallthrough(self.dns.fallthrough()?)
        .with_next(Catalog::new());

        Ok(handler)
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        info!(
            listen_addr = %self.dns.listen_addr,
            zone = %self.dns.zone,
            "Starting meshnet-dns server"
        );

        // Validate before anything is spawned
        let handler = self.handler()?;

        let refresher = Refresher::new(
            self.provider.node_source(),
            self.store.clone(),
            self.metrics.clone(),
            self.provider.refresh_interval(),
            self.provider.alias_tag_prefix.clone(),
        );
        let refresh_handle = tokio::spawn(refresher.run(shutdown.clone()));

        // Wait for the first snapshot before answering anything
        info!("Waiting for initial record sync...");
        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested before record sync completed");
                let _ = refresh_handle.await;
                return Ok(());
            }

            if self.store.generation() > 0 {
                info!(hosts = self.store.len(), "Initial record sync complete");
                break;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut server = ServerFuture::new(handler);

        let udp_socket = UdpSocket::bind(self.dns.listen_addr).await?;
        info!(addr = %self.dns.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        let tcp_listener = TcpListener::bind(self.dns.listen_addr).await?;
        info!(addr = %self.dns.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, self.dns.tcp_timeout());

        info!(zone = %self.dns.zone, "DNS server ready to serve queries");

        let metrics_handle = tokio::spawn(metrics_loop(
            self.store.clone(),
            self.metrics.clone(),
            shutdown.clone(),
        ));

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
                shutdown.cancel();
            }
        }

        let _ = metrics_handle.await;
        let _ = refresh_handle.await;

        info!("DNS server stopped");
        Ok(())
    }
}
