//! End-to-end tests for zone transfers and dynamic updates against an
//! in-process TCP nameserver.

use std::net::Ipv4Addr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use dns_zone_manager::dns::{parse_message, Header, MessageBuilder, Opcode, Question, Rcode};
use dns_zone_manager::record::{Record, RecordClass, RecordData, RecordType, Soa};
use dns_zone_manager::tsig::{compute_mac, TsigKey};
use dns_zone_manager::update::{check_update_response, UpdateOperation, UpdateSpec};
use dns_zone_manager::{transfer, update, DnsError};

const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

/// Serve a single exchange: read one framed query and answer with whatever
/// `respond` returns (written verbatim, length prefix included).
async fn nameserver<F>(respond: F) -> (String, JoinHandle<Vec<u8>>)
where
    F: FnOnce(&[u8]) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut query = vec![0u8; u16::from_be_bytes(len_buf) as usize];
        stream.read_exact(&mut query).await.unwrap();
        stream.write_all(&respond(&query)).await.unwrap();
        query
    });
    (addr, handle)
}

fn framed(message: Vec<u8>) -> Vec<u8> {
    let mut out = (message.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(&message);
    out
}

fn soa() -> Record {
    Record {
        name: "example.com.".into(),
        rtype: RecordType::SOA,
        class: RecordClass::Inet,
        ttl: 3600,
        data: RecordData::Soa(Soa {
            ns: "ns1.example.com.".into(),
            mbox: "hostmaster.example.com.".into(),
            serial: 2024060101,
            refresh: 10800,
            retry: 3600,
            expire: 604800,
            min_ttl: 86400,
        }),
    }
}

fn zone_contents() -> Vec<Record> {
    vec![
        soa(),
        Record {
            name: "example.com.".into(),
            rtype: RecordType::NS,
            class: RecordClass::Inet,
            ttl: 3600,
            data: RecordData::Ns { ns: "ns1.example.com.".into() },
        },
        Record {
            name: "example.com.".into(),
            rtype: RecordType::MX,
            class: RecordClass::Inet,
            ttl: 3600,
            data: RecordData::Opaque {
                rdata: b"\x00\x0a\x04mail\x07example\x03com\x00".to_vec(),
            },
        },
        Record::a("www.example.com.", 300, Ipv4Addr::new(192, 0, 2, 80)),
        Record {
            name: "80.2.0.192.in-addr.arpa.".into(),
            rtype: RecordType::PTR,
            class: RecordClass::Inet,
            ttl: 300,
            data: RecordData::Ptr { ptr: "www.example.com.".into() },
        },
        soa(),
    ]
}

/// Answer an AXFR query with the given records and response code.
fn axfr_response(query: &[u8], records: &[Record], rcode: Rcode) -> Vec<u8> {
    let query = parse_message(query).unwrap();
    let mut builder = MessageBuilder::new(Header {
        id: query.header.id,
        response: true,
        authoritative: true,
        rcode,
        ..Header::default()
    });
    builder.enable_compression();
    builder.start_questions().unwrap();
    for question in &query.questions {
        builder.question(question).unwrap();
    }
    builder.start_answers().unwrap();
    for record in records {
        builder.record(record).unwrap();
    }
    framed(builder.finish())
}

#[tokio::test]
async fn transfer_returns_records_in_wire_order() {
    let (addr, server) =
        nameserver(|query| axfr_response(query, &zone_contents(), Rcode::NoError)).await;

    let records = transfer("example.com.", &addr).await.unwrap();
    let query = parse_message(&server.await.unwrap()).unwrap();

    assert_eq!(
        query.questions,
        vec![Question {
            name: "example.com.".into(),
            qtype: RecordType::AXFR,
            qclass: RecordClass::Inet,
        }]
    );

    assert_eq!(records.len(), 6);
    assert_eq!(records[0], soa());
    assert_eq!(records[5], soa());

    // MX has no decoder: metadata survives, data is empty
    assert_eq!(records[2].rtype, RecordType::MX);
    assert_eq!(records[2].ttl, 3600);
    assert!(records[2].data.is_empty());
    let json = serde_json::to_value(&records[2]).unwrap();
    assert_eq!(json["Data"], serde_json::json!({}));

    let expected = zone_contents();
    for i in [1, 3, 4] {
        assert_eq!(records[i], expected[i]);
    }
}

#[tokio::test]
async fn not_authoritative_rcode_is_protocol_error() {
    let (addr, server) = nameserver(|query| axfr_response(query, &[], Rcode::from(9))).await;

    let err = transfer("example.com.", &addr).await.unwrap_err();
    server.await.unwrap();

    match err {
        DnsError::Protocol(rcode) => {
            assert_eq!(rcode.code(), 9);
            assert_eq!(rcode.description(), "not authorized: server not authoritative for zone");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn refused_transfer_is_protocol_error() {
    let (addr, server) = nameserver(|query| axfr_response(query, &[], Rcode::Refused)).await;

    let err = transfer("example.com.", &addr).await.unwrap_err();
    server.await.unwrap();
    assert!(matches!(err, DnsError::Protocol(Rcode::Refused)));
}

#[tokio::test]
async fn truncated_transfer_is_transport_error() {
    let (addr, server) = nameserver(|query| {
        let full = axfr_response(query, &zone_contents(), Rcode::NoError);
        let mut reply = vec![0x00, 100];
        reply.extend_from_slice(&full[2..42]);
        reply
    })
    .await;

    let err = transfer("example.com.", &addr).await.unwrap_err();
    server.await.unwrap();
    assert!(matches!(err, DnsError::Transport { .. }), "{:?}", err);
}

#[tokio::test]
async fn invalid_zone_fails_before_connecting() {
    // nothing listens here; a connection attempt would be a Connection error
    let err = transfer("bad..zone.", "127.0.0.1:1").await.unwrap_err();
    assert!(matches!(err, DnsError::Validation(_)));
}

#[tokio::test]
async fn signed_update_verifies_on_server() {
    let key = TsigKey::new("update-key.", "hmac-sha256", SECRET);
    let (addr, server) = nameserver(|query| {
        let parsed = parse_message(query).unwrap();
        let reply = Header {
            id: parsed.header.id,
            response: true,
            opcode: Opcode::Update,
            ..Header::default()
        };
        framed(reply.to_bytes().to_vec())
    })
    .await;

    let record = Record::a("host.example.com.", 300, Ipv4Addr::new(10, 0, 0, 5));
    let response = update("example.com.", UpdateOperation::Add, &record, &key, &addr)
        .await
        .unwrap();
    let header = check_update_response(&response).unwrap();

    let query = server.await.unwrap();
    let message = parse_message(&query).unwrap();
    assert_eq!(header.id, message.header.id);
    assert_eq!(message.header.opcode, Opcode::Update);
    assert_eq!(message.authorities.len(), 2);
    assert_eq!(message.authorities[1], record);

    // The TSIG RR is last; strip it and recompute the MAC as a server would.
    let tsig = message.additionals.last().unwrap();
    assert_eq!(tsig.rtype, RecordType::TSIG);
    let rdata = match &tsig.data {
        RecordData::Opaque { rdata } => rdata.clone(),
        other => panic!("unexpected TSIG data: {:?}", other),
    };
    let alg_len = b"\x0bhmac-sha256\x00".len();
    assert_eq!(&rdata[..alg_len], b"\x0bhmac-sha256\x00");

    let mut time = [0u8; 8];
    time[2..].copy_from_slice(&rdata[alg_len..alg_len + 6]);
    let time_signed = u64::from_be_bytes(time);
    let fudge = u16::from_be_bytes([rdata[alg_len + 6], rdata[alg_len + 7]]);
    let mac_len = u16::from_be_bytes([rdata[alg_len + 8], rdata[alg_len + 9]]) as usize;
    let mac = &rdata[alg_len + 10..alg_len + 10 + mac_len];
    assert_eq!(fudge, 300);

    let tsig_rr_len = b"\x0aupdate-key\x00".len() + 10 + rdata.len();
    let mut unsigned = query[..query.len() - tsig_rr_len].to_vec();
    unsigned[10..12].copy_from_slice(&0u16.to_be_bytes());

    assert_eq!(compute_mac(&key, &unsigned, time_signed, fudge).unwrap(), mac);
}

#[tokio::test]
async fn rejected_update_surfaces_rcode() {
    let key = TsigKey::new("update-key.", "hmac-sha256", SECRET);
    let (addr, server) = nameserver(|query| {
        let parsed = parse_message(query).unwrap();
        let reply = Header {
            id: parsed.header.id,
            response: true,
            opcode: Opcode::Update,
            rcode: Rcode::NotAuth,
            ..Header::default()
        };
        framed(reply.to_bytes().to_vec())
    })
    .await;

    let spec = UpdateSpec {
        zone: "example.com.".into(),
        operation: UpdateOperation::Delete,
        record: Record::a("host.example.com.", 0, Ipv4Addr::UNSPECIFIED),
    };
    let response = spec.apply(&key, &addr).await.unwrap();
    server.await.unwrap();

    assert!(matches!(
        check_update_response(&response),
        Err(DnsError::Protocol(Rcode::NotAuth))
    ));
}

#[tokio::test]
async fn bad_secret_fails_before_connecting() {
    let key = TsigKey::new("update-key.", "hmac-sha256", "not-base64!");
    let record = Record::a("host.example.com.", 300, Ipv4Addr::new(10, 0, 0, 5));
    let err = update("example.com.", UpdateOperation::Add, &record, &key, "127.0.0.1:1")
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::Credential(_)));
}
