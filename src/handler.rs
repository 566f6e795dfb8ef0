//! Hickory request handler answering for the mesh zone.
//!
//! Names outside the zone, and the zone apex itself, go straight to the next
//! handler. Inside the zone, A, AAAA and CNAME queries are resolved against
//! one record snapshot. A non-empty answer is sent as an authoritative
//! NOERROR; an empty one falls through to the next handler when the
//! fallthrough policy matches, and is otherwise an authoritative NXDOMAIN.

use async_trait::async_trait;
use hickory_proto::op::{Header, ResponseCode};
use hickory_proto::rr::{LowerName, Name, Record, RecordType};
use hickory_server::authority::{Catalog, MessageResponseBuilder};
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tracing::{debug, trace, warn};

use crate::error::ResolveError;
use crate::fallthrough::Fallthrough;
use crate::metrics::{Metrics, Timer};
use crate::resolve::{Answer, Chase, Resolver};
use crate::state::RecordStore;

/// Request handler for the mesh zone, chained in front of `N`.
pub struct MeshDnsHandler<N = Catalog> {
    zone: Name,
    lower_zone: LowerName,
    store: RecordStore,
    fallthrough: Fallthrough,
    metrics: Metrics,
    next: Option<N>,
}

impl MeshDnsHandler {
    /// Create a handler for `zone` with no next handler and fallthrough disabled.
    pub fn new(zone: Name, store: RecordStore, metrics: Metrics) -> Self {
        let lower_zone = LowerName::new(&zone);
        Self {
            zone,
            lower_zone,
            store,
            fallthrough: Fallthrough::disabled(),
            metrics,
            next: None,
        }
    }
}

impl<N: RequestHandler> MeshDnsHandler<N> {
    /// Chain `next` behind this handler.
    pub fn with_next<M: RequestHandler>(self, next: M) -> MeshDnsHandler<M> {
        MeshDnsHandler {
            zone: self.zone,
            lower_zone: self.lower_zone,
            store: self.store,
            fallthrough: self.fallthrough,
            metrics: self.metrics,
            next: Some(next),
        }
    }

    /// Set the fallthrough policy.
    pub fn with_fallthrough(mut self, fallthrough: Fallthrough) -> Self {
        self.fallthrough = fallthrough;
        self
    }

    /// Zone this handler answers for.
    pub fn zone(&self) -> &Name {
        &self.zone
    }

    /// True when `name` is strictly below the zone.
    pub fn claims(&self, name: &LowerName) -> bool {
        self.lower_zone.zone_of(name) && *name != self.lower_zone
    }

    /// Resolve `name` for `rtype` against the current snapshot.
    ///
    /// The read lock is held for the whole resolution, including alias
    /// fan-out, and released before anything is written to the client.
    /// Record types other than A, AAAA and CNAME produce no answers.
    pub fn resolve(&self, name: &Name, rtype: RecordType) -> Result<Vec<Answer>, ResolveError> {
        let snapshot = self.store.read();
        let mut resolver = Resolver::new(&self.zone, &snapshot);

        match rtype {
            RecordType::A => resolver.resolve_a(name)?,
            RecordType::AAAA => resolver.resolve_aaaa(name)?,
            RecordType::CNAME => resolver.resolve_cname(name, Chase::All)?,
            _ => trace!(name = %name, rtype = ?rtype, "unsupported record type"),
        }

        Ok(resolver.into_answers())
    }

    async fn dispatch<R: ResponseHandler>(
        &self,
        request: &Request,
        qname: &LowerName,
        qtype: RecordType,
        response_handle: R,
    ) -> ResponseInfo {
        if !self.claims(qname) {
            debug!(name = %qname, zone = %self.zone, "name not in zone, delegating");
            return self.delegate(request, response_handle).await;
        }

        let name = Name::from(qname.clone());
        let answers = match self.resolve(&name, qtype) {
            Ok(answers) => answers,
            Err(e) => {
                warn!(name = %name, rtype = ?qtype, error = %e, "resolution aborted");
                return send_error(request, response_handle, ResponseCode::ServFail).await;
            }
        };

        if answers.is_empty() {
            if self.fallthrough.through(&name) {
                debug!(name = %name, rtype = ?qtype, "no records, falling through");
                return self.delegate(request, response_handle).await;
            }

            debug!(name = %name, rtype = ?qtype, "no records, returning NXDOMAIN");
            return send_authoritative(request, response_handle, ResponseCode::NXDomain, &[]).await;
        }

        debug!(name = %name, rtype = ?qtype, count = answers.len(), "sending answers");
        let records: Vec<Record> = answers.iter().map(Answer::to_record).collect();
        send_authoritative(request, response_handle, ResponseCode::NoError, &records).await
    }

    async fn delegate<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match &self.next {
            Some(next) => next.handle_request(request, response_handle).await,
            None => {
                debug!("no next handler configured");
                send_error(request, response_handle, ResponseCode::ServFail).await
            }
        }
    }
}

#[async_trait]
impl<N: RequestHandler> RequestHandler for MeshDnsHandler<N> {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();

        let (qname, qtype) = match request.request_info() {
            Ok(info) => (info.query.name().clone(), info.query.query_type()),
            Err(e) => {
                warn!(error = %e, "malformed request");
                let info = send_error(request, response_handle, ResponseCode::FormErr).await;
                self.metrics
                    .record_request(None, info.response_code(), timer.elapsed());
                return info;
            }
        };

        trace!(name = %qname, rtype = ?qtype, src = %request.src(), "DNS request");
        let info = self.dispatch(request, &qname, qtype, response_handle).await;

        self.metrics
            .record_request(Some(qtype), info.response_code(), timer.elapsed());
        info
    }
}

/// Send an authoritative response carrying `records`.
async fn send_authoritative<R: ResponseHandler>(
    request: &Request,
    mut response_handle: R,
    rcode: ResponseCode,
    records: &[Record],
) -> ResponseInfo {
    let mut header = Header::response_from_request(request.header());
    header.set_authoritative(true);
    header.set_response_code(rcode);

    let response = MessageResponseBuilder::from_message_request(request).build(
        header,
        records.iter(),
        &[],
        &[],
        &[],
    );

    match response_handle.send_response(response).await {
        Ok(info) => info,
        Err(e) => {
            warn!(error = %e, rcode = ?rcode, "failed to write response");
            servfail(request)
        }
    }
}

/// Send a non-authoritative error response without records.
async fn send_error<R: ResponseHandler>(
    request: &Request,
    mut response_handle: R,
    rcode: ResponseCode,
) -> ResponseInfo {
    let mut header = Header::response_from_request(request.header());
    header.set_response_code(rcode);

    let response = MessageResponseBuilder::from_message_request(request).build_no_records(header);

    match response_handle.send_response(response).await {
        Ok(info) => info,
        Err(e) => {
            warn!(error = %e, rcode = ?rcode, "failed to write error response");
            servfail(request)
        }
    }
}

fn servfail(request: &Request) -> ResponseInfo {
    let mut header = Header::response_from_request(request.header());
    header.set_response_code(ResponseCode::ServFail);
    header.into()
}
