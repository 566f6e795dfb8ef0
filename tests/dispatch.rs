//! Zone checks, fallthrough and delegation to the next handler.

mod common;

use common::*;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, RecordType};
use meshnet_dns::fallthrough::Fallthrough;
use meshnet_dns::state::{RecordKind, Snapshot};

// =========================================================================
// Zone check
// =========================================================================

#[tokio::test]
async fn name_outside_zone_goes_to_next_handler() {
    let handler = build_chained_handler(seed_snapshot(), Fallthrough::disabled());
    let (info, msg) = execute_query(&handler, "m1.example.org", RecordType::A, 1).await;

    assert_eq!(info.response_code(), ResponseCode::NoError);
    assert!(!msg.header().authoritative());
    assert_eq!(extract_a_ips(&msg), vec![NEXT_ADDR]);
}

#[tokio::test]
async fn zone_apex_goes_to_next_handler() {
    let handler = build_chained_handler(seed_snapshot(), Fallthrough::disabled());
    let (_, msg) = execute_query(&handler, "example.com", RecordType::A, 2).await;

    assert_eq!(extract_a_ips(&msg), vec![NEXT_ADDR]);
}

#[tokio::test]
async fn zone_suffix_without_label_boundary_is_outside() {
    let handler = build_chained_handler(seed_snapshot(), Fallthrough::disabled());
    let (_, msg) = execute_query(&handler, "m1.notexample.com", RecordType::A, 3).await;

    assert_eq!(extract_a_ips(&msg), vec![NEXT_ADDR]);
}

#[tokio::test]
async fn outside_zone_without_next_handler_is_servfail() {
    let handler = build_handler(seed_snapshot());
    let (info, msg) = execute_query(&handler, "www.example.org", RecordType::A, 4).await;

    assert_eq!(info.response_code(), ResponseCode::ServFail);
    assert_response_code(&msg, ResponseCode::ServFail);
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn names_in_zone_never_reach_next_handler() {
    let handler = build_chained_handler(seed_snapshot(), Fallthrough::disabled());
    let (_, msg) = execute_query(&handler, "web.m1.example.com", RecordType::A, 5).await;

    assert!(msg.header().authoritative());
    assert_eq!(
        extract_a_ips(&msg),
        vec!["10.0.0.1".parse::<std::net::Ipv4Addr>().unwrap()]
    );
}

// =========================================================================
// Fallthrough
// =========================================================================

#[tokio::test]
async fn empty_answer_without_fallthrough_is_nxdomain() {
    let handler = build_chained_handler(seed_snapshot(), Fallthrough::disabled());
    let (_, msg) = execute_query(&handler, "missing.example.com", RecordType::A, 10).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
    assert!(msg.header().authoritative());
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn fallthrough_for_all_zones_returns_next_response() {
    let handler = build_chained_handler(seed_snapshot(), Fallthrough::all());
    let (info, msg) = execute_query(&handler, "missing.example.com", RecordType::A, 11).await;

    assert_eq!(info.response_code(), ResponseCode::NoError);
    assert_response_code(&msg, ResponseCode::NoError);
    assert!(!msg.header().authoritative());
    assert_eq!(
        render_answers(&msg),
        vec![format!("A missing.example.com. {NEXT_ADDR}")]
    );
}

#[tokio::test]
async fn fallthrough_limited_to_matching_zone() {
    let handler = build_chained_handler(
        seed_snapshot(),
        Fallthrough::zones(vec![Name::from_ascii("example.com.").unwrap()]),
    );
    let (_, msg) = execute_query(&handler, "missing.example.com", RecordType::AAAA, 12).await;

    assert_eq!(extract_a_ips(&msg), vec![NEXT_ADDR]);
}

#[tokio::test]
async fn fallthrough_for_other_zone_is_nxdomain() {
    let handler = build_chained_handler(
        seed_snapshot(),
        Fallthrough::zones(vec![Name::from_ascii("example.net.").unwrap()]),
    );
    let (_, msg) = execute_query(&handler, "missing.example.com", RecordType::A, 13).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn fallthrough_covers_unsupported_types() {
    let handler = build_chained_handler(seed_snapshot(), Fallthrough::all());
    let (_, msg) = execute_query(&handler, "m1.example.com", RecordType::MX, 14).await;

    assert_eq!(extract_a_ips(&msg), vec![NEXT_ADDR]);
}

#[tokio::test]
async fn fallthrough_without_next_handler_is_servfail() {
    let handler = build_handler(seed_snapshot()).with_fallthrough(Fallthrough::all());
    let (_, msg) = execute_query(&handler, "missing.example.com", RecordType::A, 15).await;

    assert_response_code(&msg, ResponseCode::ServFail);
}

#[tokio::test]
async fn alias_loop_is_servfail_even_with_fallthrough() {
    let mut snapshot = Snapshot::new();
    snapshot.insert_str("a", RecordKind::Cname, "a").unwrap();
    let handler = build_chained_handler(snapshot, Fallthrough::all());

    let (info, msg) = execute_query(&handler, "a.example.com", RecordType::A, 16).await;
    assert_eq!(info.response_code(), ResponseCode::ServFail);
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn runaway_alias_fan_out_is_servfail() {
    // Three levels of five-way fan-out: 155 CNAME records if fully expanded.
    let mut snapshot = Snapshot::new();
    for level in 0..3 {
        for n in 0..5 {
            for next in 0..5 {
                snapshot
                    .insert_str(
                        &format!("l{level}n{n}"),
                        RecordKind::Cname,
                        &format!("l{}n{next}", level + 1),
                    )
                    .unwrap();
            }
        }
    }
    for n in 0..5 {
        snapshot
            .insert_str(&format!("l3n{n}"), RecordKind::A, "10.0.0.3")
            .unwrap();
    }
    let handler = build_chained_handler(snapshot, Fallthrough::all());

    let (info, msg) = execute_query(&handler, "l0n0.example.com", RecordType::A, 17).await;
    assert_eq!(info.response_code(), ResponseCode::ServFail);
    assert_response_code(&msg, ResponseCode::ServFail);
    assert!(msg.answers().is_empty());
}

// =========================================================================
// Transport
// =========================================================================

#[tokio::test]
async fn write_failure_reports_servfail() {
    use hickory_server::server::RequestHandler as _;

    let handler = build_handler(seed_snapshot());
    let request = build_request("m1.example.com", RecordType::A, 20);
    let info = handler.handle_request(&request, FailingResponseHandler).await;

    assert_eq!(info.response_code(), ResponseCode::ServFail);
}

#[tokio::test]
async fn response_echoes_query_id() {
    let handler = build_chained_handler(seed_snapshot(), Fallthrough::disabled());

    for (name, id) in [
        ("m1.example.com", 4242),
        ("missing.example.com", 4243),
        ("m1.example.org", 4244),
    ] {
        let (_, msg) = execute_query(&handler, name, RecordType::A, id).await;
        assert_eq!(msg.id(), id);
        assert_eq!(msg.queries().len(), 1);
    }
}
