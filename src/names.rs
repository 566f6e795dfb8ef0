//! Mapping query names onto host keys.
//!
//! Only the single label directly below the zone selects records; every label
//! in front of it is kept as a prefix. This is what makes
//! `a.b.server1.<zone>` answer like `server1.<zone>` without wildcard records,
//! and what lets an alias carry the prefix over to its target.

use hickory_proto::rr::Name;
use hickory_proto::ProtoError;

/// Number of trailing labels two names share, compared case-insensitively.
/// The root label is not counted.
pub fn common_suffix_labels(a: &Name, b: &Name) -> usize {
    let a: Vec<&[u8]> = a.iter().collect();
    let b: Vec<&[u8]> = b.iter().collect();

    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count()
}

/// A query name split into its host key and the labels in front of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostName {
    host_key: String,
    prefix: Vec<Vec<u8>>,
}

impl HostName {
    /// Split `name` relative to `zone`.
    ///
    /// Returns `None` unless `name` lies strictly below `zone`.
    pub fn split(name: &Name, zone: &Name) -> Option<Self> {
        let labels: Vec<&[u8]> = name.iter().collect();
        let zone_labels = zone.iter().count();
        let common = common_suffix_labels(name, zone);

        if common < zone_labels || labels.len() <= common {
            return None;
        }

        let index = labels.len() - common - 1;
        Some(Self {
            host_key: String::from_utf8_lossy(labels[index]).to_ascii_lowercase(),
            prefix: labels[..index].iter().map(|label| label.to_vec()).collect(),
        })
    }

    /// Lower-case label used to index the record store.
    pub fn host_key(&self) -> &str {
        &self.host_key
    }

    /// Labels before the host key, in query order.
    pub fn prefix(&self) -> &[Vec<u8>] {
        &self.prefix
    }

    /// Prepend this name's prefix to `target`.
    ///
    /// `sub.alias.<zone>` with `alias -> server1.<zone>` becomes
    /// `sub.server1.<zone>`. Without a prefix the target is returned as is.
    pub fn rebase(&self, target: &Name) -> Result<Name, ProtoError> {
        if self.prefix.is_empty() {
            return Ok(target.clone());
        }

        Name::from_labels(
            self.prefix
                .iter()
                .map(Vec::as_slice)
                .chain(target.iter()),
        )
    }
}

/// Turn a stored CNAME value into an absolute name.
///
/// Values ending in a dot, or already inside `zone`, are absolute. Anything
/// else is taken relative to `zone`, so a bare `server1` means
/// `server1.<zone>`.
pub fn qualify(target: &str, zone: &Name) -> Result<Name, ProtoError> {
    let mut name = Name::from_ascii(target)?;
    if name.is_fqdn() {
        return Ok(name);
    }

    name.set_fqdn(true);
    if zone.zone_of(&name) {
        return Ok(name);
    }

    Name::from_ascii(target)?.append_domain(zone)
}
