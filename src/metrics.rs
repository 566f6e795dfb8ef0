//! Metrics instrumentation for meshnet-dns.
//!
//! All metrics are prefixed with `mesh_dns.` and carry a `server` label
//! identifying the listener they were recorded for.

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Handle for recording request and state metrics.
///
/// Built once at startup and handed to the request handler and refresher.
#[derive(Debug, Clone)]
pub struct Metrics {
    server: String,
}

impl Metrics {
    /// Create a handle labelling everything with `server`.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    /// Server label.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Record one handled request: its type, final response code and duration.
    pub fn record_request(
        &self,
        rtype: Option<RecordType>,
        rcode: ResponseCode,
        duration: Duration,
    ) {
        let rtype = rtype.map_or_else(|| "unknown".to_string(), |t| t.to_string());

        counter!("mesh_dns.request.count", "server" => self.server.clone(), "type" => rtype)
            .increment(1);
        counter!(
            "mesh_dns.response.count",
            "server" => self.server.clone(),
            "rcode" => rcode_label(rcode)
        )
        .increment(1);
        histogram!("mesh_dns.request.duration.seconds", "server" => self.server.clone())
            .record(duration.as_secs_f64());
    }

    /// Record the number of host keys currently loaded.
    pub fn record_hosts(&self, count: usize) {
        gauge!("mesh_dns.state.hosts.count", "server" => self.server.clone()).set(count as f64);
    }

    /// Record the outcome of a record store refresh. Refreshes are per
    /// process, so this counter carries no `server` label.
    pub fn record_refresh(&self, result: RefreshResult) {
        let result_str = match result {
            RefreshResult::Success => "success",
            RefreshResult::Error => "error",
        };

        counter!("mesh_dns.refresh.count", "result" => result_str).increment(1);
    }
}

/// Refresh result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum RefreshResult {
    /// A new snapshot was swapped in.
    Success,
    /// Fetching nodes failed; the previous snapshot keeps serving.
    Error,
}

/// Label value for a response code, in the usual upper-case mnemonic form.
pub fn rcode_label(rcode: ResponseCode) -> String {
    match rcode {
        ResponseCode::NoError => "NOERROR".to_string(),
        ResponseCode::FormErr => "FORMERR".to_string(),
        ResponseCode::ServFail => "SERVFAIL".to_string(),
        ResponseCode::NXDomain => "NXDOMAIN".to_string(),
        ResponseCode::NotImp => "NOTIMP".to_string(),
        ResponseCode::Refused => "REFUSED".to_string(),
        other => format!("{other:?}").to_ascii_uppercase(),
    }
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
