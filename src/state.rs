//! In-memory record store refreshed from the mesh control plane.
//!
//! Each host key is a single lower-case DNS label naming either a machine
//! (A/AAAA records) or a tag-derived alias (CNAME records). The store holds one
//! [`Snapshot`] at a time; refreshes swap in a complete new snapshot under the
//! write lock, so a reader never observes a half-applied update.

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::error::DnsError;
use crate::metrics::Metrics;
use crate::provider::MeshNode;

/// Record kinds served by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// IPv4 address.
    A,
    /// IPv6 address.
    Aaaa,
    /// Alias to another host.
    Cname,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
            RecordKind::Cname => "CNAME",
        })
    }
}

impl FromStr for RecordKind {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordKind::A),
            "AAAA" => Ok(RecordKind::Aaaa),
            "CNAME" => Ok(RecordKind::Cname),
            _ => Err(DnsError::UnknownKind(s.to_string())),
        }
    }
}

/// A single stored record value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// IPv4 address.
    A(Ipv4Addr),
    /// IPv6 address.
    Aaaa(Ipv6Addr),
    /// Alias target, relative to the zone or absolute.
    Cname(String),
}

impl RecordData {
    /// Parse a textual value supplied for `kind`.
    pub fn parse(kind: RecordKind, value: &str) -> Result<Self, DnsError> {
        let invalid = || DnsError::InvalidRecord {
            kind,
            value: value.to_string(),
        };

        match kind {
            RecordKind::A => value.parse().map(RecordData::A).map_err(|_| invalid()),
            RecordKind::Aaaa => value.parse().map(RecordData::Aaaa).map_err(|_| invalid()),
            RecordKind::Cname => {
                let target = value.trim();
                if target.is_empty() || target == "." {
                    return Err(invalid());
                }
                Ok(RecordData::Cname(target.to_string()))
            }
        }
    }

    /// Kind of this value.
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordData::A(_) => RecordKind::A,
            RecordData::Aaaa(_) => RecordKind::Aaaa,
            RecordData::Cname(_) => RecordKind::Cname,
        }
    }
}

/// Records stored under one host key, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRecords {
    /// IPv4 addresses.
    pub a: Vec<Ipv4Addr>,
    /// IPv6 addresses.
    pub aaaa: Vec<Ipv6Addr>,
    /// Alias targets.
    pub cname: Vec<String>,
}

impl HostRecords {
    fn push(&mut self, data: RecordData) {
        match data {
            RecordData::A(ip) => self.a.push(ip),
            RecordData::Aaaa(ip) => self.aaaa.push(ip),
            RecordData::Cname(target) => self.cname.push(target),
        }
    }
}

/// One complete view of the records, as produced by a single refresh.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    hosts: HashMap<String, HostRecords>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record value under `host`. Host keys are case-insensitive.
    pub fn insert(&mut self, host: &str, data: RecordData) {
        self.hosts
            .entry(host.to_ascii_lowercase())
            .or_default()
            .push(data);
    }

    /// Parse and append a textual record value.
    pub fn insert_str(
        &mut self,
        host: &str,
        kind: RecordKind,
        value: &str,
    ) -> Result<(), DnsError> {
        self.insert(host, RecordData::parse(kind, value)?);
        Ok(())
    }

    /// Records stored under a (lower-case) host key.
    pub fn get(&self, host: &str) -> Option<&HostRecords> {
        self.hosts.get(host)
    }

    /// Number of host keys.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// True when no host key is present.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Iterate over host keys and their records.
    pub fn hosts(&self) -> impl Iterator<Item = (&str, &HostRecords)> {
        self.hosts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Derive a snapshot from the control plane's node list.
    ///
    /// Every node contributes `<hostname>` with its addresses. Every tag that
    /// starts with `alias_tag_prefix` contributes `<rest of tag>` as a CNAME to
    /// the node's hostname; nodes sharing an alias tag fan out into several
    /// targets.
    pub fn from_nodes(nodes: &[MeshNode], alias_tag_prefix: &str) -> Self {
        let mut snapshot = Self::new();

        for node in nodes {
            let host = node.hostname.trim().to_ascii_lowercase();
            if host.is_empty() || host.contains('.') {
                debug!(hostname = %node.hostname, "skipping node without a single-label hostname");
                continue;
            }

            for ip in &node.ipv4 {
                snapshot.insert(&host, RecordData::A(*ip));
            }
            for ip in &node.ipv6 {
                snapshot.insert(&host, RecordData::Aaaa(*ip));
            }

            for tag in &node.tags {
                let Some(alias) = tag.strip_prefix(alias_tag_prefix) else {
                    continue;
                };
                if alias.is_empty() || alias.contains('.') {
                    debug!(tag = %tag, "skipping alias tag without a single-label name");
                    continue;
                }
                snapshot.insert(alias, RecordData::Cname(host.clone()));
            }
        }

        snapshot
    }
}

/// Thread-safe handle to the current snapshot.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    snapshot: Snapshot,
    /// Incremented on every replace.
    generation: u64,
}

impl RecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        store.replace(snapshot);
        store
    }

    /// Swap in a complete new snapshot.
    pub fn replace(&self, snapshot: Snapshot) {
        let mut inner = self.inner.write();
        inner.snapshot = snapshot;
        inner.generation = inner.generation.wrapping_add(1);
        debug!(
            hosts = inner.snapshot.len(),
            generation = inner.generation,
            "replaced record snapshot"
        );
    }

    /// Read access to one consistent snapshot.
    ///
    /// Writers are excluded for as long as the guard lives, so hold it only
    /// for synchronous work.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, Snapshot> {
        RwLockReadGuard::map(self.inner.read(), |inner| &inner.snapshot)
    }

    /// Number of host keys currently loaded.
    pub fn len(&self) -> usize {
        self.inner.read().snapshot.len()
    }

    /// True when nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of snapshots swapped in so far. Zero until the first refresh.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Emit the loaded-entries gauge.
    pub fn emit_metrics(&self, metrics: &Metrics) {
        metrics.record_hosts(self.len());
    }
}
