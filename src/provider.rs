//! Record store population from the mesh control plane.
//!
//! A [`NodeSource`] yields the current node list; the [`Refresher`] turns it
//! into a fresh [`Snapshot`] on a fixed interval and swaps it into the store.
//! A failed fetch leaves the previous snapshot serving.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::DnsError;
use crate::metrics::{Metrics, RefreshResult};
use crate::state::{RecordStore, Snapshot};

/// A machine as reported by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshNode {
    /// Single-label machine name.
    pub hostname: String,

    /// Mesh IPv4 addresses.
    #[serde(default)]
    pub ipv4: Vec<Ipv4Addr>,

    /// Mesh IPv6 addresses.
    #[serde(default)]
    pub ipv6: Vec<Ipv6Addr>,

    /// ACL tags, e.g. `tag:cname-app`.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Source of the current node list.
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// Fetch every node currently known.
    async fn fetch(&self) -> Result<Vec<MeshNode>, DnsError>;
}

/// Fixed node list, usually taken from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticNodeSource {
    nodes: Vec<MeshNode>,
}

impl StaticNodeSource {
    /// Serve `nodes` on every fetch.
    pub fn new(nodes: Vec<MeshNode>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeSource for StaticNodeSource {
    async fn fetch(&self) -> Result<Vec<MeshNode>, DnsError> {
        Ok(self.nodes.clone())
    }
}

/// Node list read from a TOML file with `[[nodes]]` tables, re-read on every fetch.
#[derive(Debug, Clone)]
pub struct FileNodeSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct NodeFile {
    #[serde(default)]
    nodes: Vec<MeshNode>,
}

impl FileNodeSource {
    /// Read nodes from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl NodeSource for FileNodeSource {
    async fn fetch(&self) -> Result<Vec<MeshNode>, DnsError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let file: NodeFile = toml::from_str(&contents)?;
        debug!(path = %self.path.display(), nodes = file.nodes.len(), "read node file");
        Ok(file.nodes)
    }
}

/// Periodically rebuilds the record store from a [`NodeSource`].
pub struct Refresher {
    source: Arc<dyn NodeSource>,
    store: RecordStore,
    metrics: Metrics,
    interval: Duration,
    alias_tag_prefix: String,
}

impl Refresher {
    /// Create a refresher writing into `store`.
    pub fn new(
        source: Arc<dyn NodeSource>,
        store: RecordStore,
        metrics: Metrics,
        interval: Duration,
        alias_tag_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            metrics,
            interval,
            alias_tag_prefix: alias_tag_prefix.into(),
        }
    }

    /// Fetch nodes once and swap in the derived snapshot. Returns the host count.
    pub async fn sync_once(&self) -> Result<usize, DnsError> {
        let nodes = self.source.fetch().await?;
        let snapshot = Snapshot::from_nodes(&nodes, &self.alias_tag_prefix);
        let hosts = snapshot.len();

        self.store.replace(snapshot);
        self.metrics.record_hosts(hosts);
        Ok(hosts)
    }

    /// Sync immediately, then every interval, until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("record refresher shutting down");
                    return;
                }
                _ = interval.tick() => {
                    match self.sync_once().await {
                        Ok(hosts) => {
                            debug!(
                                hosts,
                                generation = self.store.generation(),
                                "record store refreshed"
                            );
                            self.metrics.record_refresh(RefreshResult::Success);
                        }
                        Err(e) => {
                            error!(
                                error = %e,
                                "record store refresh failed, keeping previous records"
                            );
                            self.metrics.record_refresh(RefreshResult::Error);
                        }
                    }
                }
            }
        }
    }
}
