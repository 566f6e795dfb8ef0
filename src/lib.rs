//! meshnet-dns - Authoritative DNS for the machines of a mesh network.
//!
//! Every machine is reachable as `<hostname>.<zone>`, and tag-derived aliases
//! as `<alias>.<zone>` via CNAME. Any number of extra labels in front of a
//! known name resolve to the same addresses, without wildcard records.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          meshnet-dns                           │
//! │                                                                │
//! │  ┌──────────────────┐  replace   ┌──────────────────┐          │
//! │  │ Refresher        │──────────▶│  RecordStore     │          │
//! │  │ (node source)    │  snapshot  │  (RwLock)        │          │
//! │  └──────────────────┘            └────────┬─────────┘          │
//! │                                           │ read               │
//! │                                           ▼                    │
//! │  UDP/TCP ──▶ MeshDnsHandler ──▶ Resolver (names + aliases)     │
//! │                   │                                            │
//! │                   └── outside zone / fallthrough ──▶ next      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Resolution
//!
//! ```text
//! admin.app.ts.example.com  A?
//!   → host key "app" (label right below the zone), prefix "admin"
//!   → app is an alias for server1
//!   → CNAME admin.app.ts.example.com → admin.server1.ts.example.com
//!   → host key "server1" → A admin.server1.ts.example.com → 100.64.0.1
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use meshnet_dns::{Config, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let raw = std::fs::read_to_string("meshnet-dns.toml").unwrap();
//!     let config: Config = toml::from_str(&raw).unwrap();
//!     let server = DnsServer::new(config.dns, config.provider);
//!     server.run(CancellationToken::new()).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod fallthrough;
pub mod handler;
pub mod metrics;
pub mod names;
pub mod provider;
pub mod resolve;
pub mod server;
pub mod state;
pub mod telemetry;

// Re-export main types
pub use crate::config::{Config, DnsConfig, ProviderConfig, TelemetryConfig};
pub use crate::error::{DnsError, ResolveError};
pub use crate::fallthrough::Fallthrough;
pub use crate::handler::MeshDnsHandler;
pub use crate::metrics::Metrics;
pub use crate::provider::{MeshNode, NodeSource, Refresher};
pub use crate::server::DnsServer;
pub use crate::state::{RecordStore, Snapshot};
