//! Shared test infrastructure for request handler integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Header, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse, MessageResponseBuilder};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use meshnet_dns::fallthrough::Fallthrough;
use meshnet_dns::handler::MeshDnsHandler;
use meshnet_dns::metrics::Metrics;
use meshnet_dns::state::{RecordKind, RecordStore, Snapshot};

// --- Constants ---

pub const ZONE: &str = "example.com.";
/// Address the canned next handler answers with.
pub const NEXT_ADDR: Ipv4Addr = Ipv4Addr::new(100, 100, 100, 100);

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// The response is serialized via `MessageResponse::destructive_emit()` and stored
/// as raw wire-format bytes, which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

/// Fails every write, like a client that has gone away.
#[derive(Clone)]
pub struct FailingResponseHandler;

#[async_trait]
impl ResponseHandler for FailingResponseHandler {
    async fn send_response<'a>(
        &mut self,
        _response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

// --- Next handler ---

/// Next handler that answers every query with one A record for `NEXT_ADDR`.
#[derive(Clone)]
pub struct CannedNextHandler;

#[async_trait]
impl RequestHandler for CannedNextHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let info = request.request_info().expect("request without a query");
        let name = Name::from(info.query.name().clone());
        let record = Record::from_rdata(name, 60, RData::A(A::from(NEXT_ADDR)));

        let header = Header::response_from_request(request.header());
        let response = MessageResponseBuilder::from_message_request(request).build(
            header,
            std::iter::once(&record),
            &[],
            &[],
            &[],
        );
        response_handle
            .send_response(response)
            .await
            .expect("failed to send next handler response")
    }
}

// --- Record data ---

/// Seed data: `m1` is a machine, `alias` points at it.
pub fn seed_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.insert_str("m1", RecordKind::A, "10.0.0.1").unwrap();
    snapshot.insert_str("m1", RecordKind::Aaaa, "fd00::1").unwrap();
    snapshot.insert_str("alias", RecordKind::Cname, "m1").unwrap();
    snapshot
}

pub fn zone() -> Name {
    Name::from_ascii(ZONE).unwrap()
}

/// Handler over `snapshot` with no next handler.
pub fn build_handler(snapshot: Snapshot) -> MeshDnsHandler {
    MeshDnsHandler::new(
        zone(),
        RecordStore::with_snapshot(snapshot),
        Metrics::new("test"),
    )
}

/// Handler over `snapshot` chained in front of `CannedNextHandler`.
pub fn build_chained_handler(
    snapshot: Snapshot,
    fallthrough: Fallthrough,
) -> MeshDnsHandler<CannedNextHandler> {
    build_handler(snapshot)
        .with_fallthrough(fallthrough)
        .with_next(CannedNextHandler)
}

// --- Query/Request construction ---

pub fn client_addr() -> SocketAddr {
    "10.0.0.99:12345".parse().unwrap()
}

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` from a UDP client.
pub fn build_request(name: &str, record_type: RecordType, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let msg = parse_message_request(&bytes);
    Request::new(msg, client_addr(), Protocol::Udp)
}

// --- Response helpers ---

/// Execute a query through `handler`; returns what the handler reported and
/// what the client received.
pub async fn execute_query<H: RequestHandler>(
    handler: &H,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> (ResponseInfo, Message) {
    let request = build_request(name, record_type, id);
    let response = TestResponseHandler::new();
    let info = handler.handle_request(&request, response.clone()).await;
    (info, response.into_message())
}

/// Render answers as `<type> <owner> <value>` for compact assertions.
pub fn render_answers(msg: &Message) -> Vec<String> {
    msg.answers()
        .iter()
        .map(|r| match r.data() {
            RData::A(a) => format!("A {} {}", r.name(), a.0),
            RData::AAAA(aaaa) => format!("AAAA {} {}", r.name(), aaaa.0),
            RData::CNAME(cname) => format!("CNAME {} {}", r.name(), cname.0),
            other => format!("{} {} {:?}", r.record_type(), r.name(), other),
        })
        .collect()
}

/// Extract A addresses from a response.
pub fn extract_a_ips(msg: &Message) -> Vec<Ipv4Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(a.0),
            _ => None,
        })
        .collect()
}

/// Extract AAAA addresses from a response.
pub fn extract_aaaa_ips(msg: &Message) -> Vec<Ipv6Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::AAAA(aaaa) => Some(aaaa.0),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}
