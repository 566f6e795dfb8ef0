//! Error types for meshnet-dns.

use thiserror::Error;

use crate::state::RecordKind;

/// Errors that can occur while setting up the server or populating records.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// A record value did not parse for its kind.
    #[error("invalid {kind} record value {value:?}")]
    InvalidRecord {
        /// Kind the value was supplied for.
        kind: RecordKind,
        /// Offending value.
        value: String,
    },

    /// Unknown record kind name.
    #[error("unsupported record kind {0:?}")]
    UnknownKind(String),

    /// Node list could not be decoded.
    #[error("failed to parse node list: {0}")]
    NodeList(#[from] toml::de::Error),
}

/// Alias chasing stopped on malformed record data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// An alias chain led back to a host key that is still being expanded.
    #[error("alias loop at host {host:?}")]
    AliasLoop {
        /// Host key that was entered twice.
        host: String,
    },

    /// An alias chain grew past the depth ceiling.
    #[error("alias chain deeper than {limit} at host {host:?}")]
    AliasDepth {
        /// Host key at which the ceiling was hit.
        host: String,
        /// Configured ceiling.
        limit: usize,
    },

    /// Alias fan-out synthesized more CNAME records than one answer may hold.
    #[error("alias fan-out beyond {limit} records at host {host:?}")]
    AliasFanOut {
        /// Host key being expanded when the ceiling was hit.
        host: String,
        /// Configured ceiling.
        limit: usize,
    },
}
