//! Record resolution over one record snapshot.
//!
//! A and AAAA lookups answer from the host key's addresses and fall back to
//! alias chasing when the key has none. Alias chasing emits one CNAME per
//! stored target, rebased onto the caller's subdomain prefix, and then
//! resolves the requested address family at that target. All emitted records
//! keep the name the caller asked about as their owner; only the CNAME target
//! carries the rebased name.

use hickory_proto::rr::rdata::{A, AAAA, CNAME};
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::{debug, trace, warn};

use crate::error::ResolveError;
use crate::names::{qualify, HostName};
use crate::state::Snapshot;

/// TTL of every synthesized record, in seconds.
pub const RECORD_TTL: u32 = 60;

/// Maximum number of aliases expanded in one chain.
pub const MAX_ALIAS_DEPTH: usize = 8;

/// Maximum number of CNAME records one query may synthesize, across all
/// branches of an alias fan-out.
pub const MAX_ALIAS_EXPANSIONS: usize = 64;

/// Address families to resolve at an alias target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chase {
    /// Direct CNAME query: both families.
    All,
    /// Fallback from an A lookup.
    A,
    /// Fallback from an AAAA lookup.
    Aaaa,
}

impl Chase {
    fn wants_a(self) -> bool {
        matches!(self, Chase::All | Chase::A)
    }

    fn wants_aaaa(self) -> bool {
        matches!(self, Chase::All | Chase::Aaaa)
    }
}

/// Payload of a synthesized answer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerData {
    /// IPv4 address.
    A(Ipv4Addr),
    /// IPv6 address.
    Aaaa(Ipv6Addr),
    /// Alias target.
    Cname(Name),
}

/// One answer record, before conversion to wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Owner name.
    pub name: Name,
    /// Record payload.
    pub data: AnswerData,
}

impl Answer {
    /// Convert to an IN-class record with the fixed TTL.
    pub fn to_record(&self) -> Record {
        let rdata = match &self.data {
            AnswerData::A(ip) => RData::A(A::from(*ip)),
            AnswerData::Aaaa(ip) => RData::AAAA(AAAA::from(*ip)),
            AnswerData::Cname(target) => RData::CNAME(CNAME(target.clone())),
        };

        let mut record = Record::from_rdata(self.name.clone(), RECORD_TTL, rdata);
        record.set_dns_class(DNSClass::IN);
        record
    }
}

/// Accumulates the answer for a single query.
///
/// Borrow the snapshot from one [`RecordStore::read`](crate::state::RecordStore::read)
/// guard for the whole query so alias fan-out sees a single consistent view.
#[derive(Debug)]
pub struct Resolver<'a> {
    zone: &'a Name,
    snapshot: &'a Snapshot,
    answers: Vec<Answer>,
    /// Host keys of the aliases currently being expanded.
    chain: Vec<String>,
    /// CNAME records emitted so far.
    expansions: usize,
}

impl<'a> Resolver<'a> {
    /// Create a resolver for `zone` over `snapshot`.
    pub fn new(zone: &'a Name, snapshot: &'a Snapshot) -> Self {
        Self {
            zone,
            snapshot,
            answers: Vec::new(),
            chain: Vec::new(),
            expansions: 0,
        }
    }

    /// Resolve IPv4 addresses for `name`, chasing aliases when the host has none.
    pub fn resolve_a(&mut self, name: &Name) -> Result<(), ResolveError> {
        let Some(host) = self.split(name) else {
            return Ok(());
        };

        let snapshot = self.snapshot;
        match snapshot.get(host.host_key()).map(|records| &records.a) {
            Some(addrs) if !addrs.is_empty() => {
                debug!(
                    name = %name,
                    host = host.host_key(),
                    count = addrs.len(),
                    "A records found"
                );
                self.answers.extend(addrs.iter().map(|ip| Answer {
                    name: name.clone(),
                    data: AnswerData::A(*ip),
                }));
                Ok(())
            }
            _ => {
                trace!(name = %name, host = host.host_key(), "no A records, trying CNAME");
                self.chase(name, &host, Chase::A)
            }
        }
    }

    /// Resolve IPv6 addresses for `name`, chasing aliases when the host has none.
    pub fn resolve_aaaa(&mut self, name: &Name) -> Result<(), ResolveError> {
        let Some(host) = self.split(name) else {
            return Ok(());
        };

        let snapshot = self.snapshot;
        match snapshot.get(host.host_key()).map(|records| &records.aaaa) {
            Some(addrs) if !addrs.is_empty() => {
                debug!(
                    name = %name,
                    host = host.host_key(),
                    count = addrs.len(),
                    "AAAA records found"
                );
                self.answers.extend(addrs.iter().map(|ip| Answer {
                    name: name.clone(),
                    data: AnswerData::Aaaa(*ip),
                }));
                Ok(())
            }
            _ => {
                trace!(name = %name, host = host.host_key(), "no AAAA records, trying CNAME");
                self.chase(name, &host, Chase::Aaaa)
            }
        }
    }

    /// Resolve the aliases of `name`, following them for the families in `chase`.
    pub fn resolve_cname(&mut self, name: &Name, chase: Chase) -> Result<(), ResolveError> {
        match self.split(name) {
            Some(host) => self.chase(name, &host, chase),
            None => Ok(()),
        }
    }

    /// Answers accumulated so far.
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// Consume the resolver, returning its answers in emission order.
    pub fn into_answers(self) -> Vec<Answer> {
        self.answers
    }

    fn split(&self, name: &Name) -> Option<HostName> {
        let host = HostName::split(name, self.zone);
        if host.is_none() {
            trace!(name = %name, zone = %self.zone, "name not below zone, nothing to synthesize");
        }
        host
    }

    fn chase(&mut self, name: &Name, host: &HostName, chase: Chase) -> Result<(), ResolveError> {
        let snapshot = self.snapshot;
        let targets = match snapshot.get(host.host_key()) {
            Some(records) if !records.cname.is_empty() => &records.cname,
            _ => {
                trace!(host = host.host_key(), "no CNAME records");
                return Ok(());
            }
        };

        if self.chain.iter().any(|key| key == host.host_key()) {
            return Err(ResolveError::AliasLoop {
                host: host.host_key().to_string(),
            });
        }
        if self.chain.len() >= MAX_ALIAS_DEPTH {
            return Err(ResolveError::AliasDepth {
                host: host.host_key().to_string(),
                limit: MAX_ALIAS_DEPTH,
            });
        }

        self.chain.push(host.host_key().to_string());
        for target in targets {
            let effective = match qualify(target, self.zone).and_then(|t| host.rebase(&t)) {
                Ok(effective) => effective,
                Err(e) => {
                    warn!(
                        host = host.host_key(),
                        target = %target,
                        error = %e,
                        "skipping unusable CNAME target"
                    );
                    continue;
                }
            };

            self.expansions += 1;
            if self.expansions > MAX_ALIAS_EXPANSIONS {
                return Err(ResolveError::AliasFanOut {
                    host: host.host_key().to_string(),
                    limit: MAX_ALIAS_EXPANSIONS,
                });
            }

            debug!(name = %name, target = %effective, "adding CNAME record");
            self.answers.push(Answer {
                name: name.clone(),
                data: AnswerData::Cname(effective.clone()),
            });

            if chase.wants_a() {
                self.resolve_a(&effective)?;
            }
            if chase.wants_aaaa() {
                self.resolve_aaaa(&effective)?;
            }
        }
        self.chain.pop();

        Ok(())
    }
}
