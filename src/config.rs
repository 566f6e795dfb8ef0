//! Configuration types for meshnet-dns.

use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::DnsError;
use crate::fallthrough::Fallthrough;
use crate::provider::{FileNodeSource, MeshNode, NodeSource, StaticNodeSource};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// Where node data comes from.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    pub listen_addr: SocketAddr,

    /// Zone this server is authoritative for (e.g., "ts.example.com").
    /// Machine names are direct children of it.
    pub zone: String,

    /// Value of the `server` label on every metric.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Idle timeout for TCP connections in seconds.
    #[serde(default = "default_tcp_timeout")]
    pub tcp_timeout_secs: u64,

    /// Zones whose unknown names go to the next handler instead of NXDOMAIN.
    /// Absent disables fallthrough; an empty list enables it for every name.
    #[serde(default)]
    pub fallthrough: Option<Vec<String>>,
}

impl DnsConfig {
    /// Parse and validate the configured zone.
    pub fn zone_name(&self) -> Result<Name, DnsError> {
        let mut zone = Name::from_ascii(&self.zone)?;
        zone.set_fqdn(true);
        if zone.is_root() {
            return Err(DnsError::Config("zone must not be the root".to_string()));
        }
        Ok(zone)
    }

    /// Build the fallthrough policy.
    pub fn fallthrough(&self) -> Result<Fallthrough, DnsError> {
        Fallthrough::from_config(self.fallthrough.as_deref())
    }

    /// TCP idle timeout.
    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_secs(self.tcp_timeout_secs)
    }
}

/// Node data configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// TOML file with `[[nodes]]` tables, re-read on every refresh.
    /// Takes precedence over `nodes`.
    #[serde(default)]
    pub nodes_file: Option<PathBuf>,

    /// Inline node list.
    #[serde(default)]
    pub nodes: Vec<MeshNode>,

    /// Seconds between refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Tag prefix marking an alias, e.g. `tag:cname-app` aliases `app`.
    #[serde(default = "default_alias_tag_prefix")]
    pub alias_tag_prefix: String,
}

impl ProviderConfig {
    /// Node source selected by this configuration.
    pub fn node_source(&self) -> Arc<dyn NodeSource> {
        match &self.nodes_file {
            Some(path) => Arc::new(FileNodeSource::new(path.clone())),
            None => Arc::new(StaticNodeSource::new(self.nodes.clone())),
        }
    }

    /// Refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            nodes_file: None,
            nodes: Vec::new(),
            refresh_interval_secs: default_refresh_interval(),
            alias_tag_prefix: default_alias_tag_prefix(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "meshnet_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "meshnet-dns".to_string()
}

fn default_server_name() -> String {
    "dns://:53".to_string()
}

fn default_tcp_timeout() -> u64 {
    30
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_alias_tag_prefix() -> String {
    "tag:cname-".to_string()
}
