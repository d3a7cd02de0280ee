//! Fuzz target for record round trips
//!
//! Drives a seeded client/server pair through an arbitrary sequence of
//! sends, key updates and tampered deliveries.
//!
//! # Invariants
//!
//! - Every untampered record decodes to exactly what was sent
//! - Every tampered record is rejected as `bad_record_mac`
//! - Encoded records never exceed the cipher's own encode limit

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tlsrec_harness::{ConnectionPair, TLS_HEADER_LEN};
use tlsrec_proto::{ContentType, ProtocolVersion};
use tlsrec_record::{CipherSuite, RecordCipher, RecordError};

#[derive(Debug, Arbitrary)]
enum Op {
    ClientSend { content_type: u8, payload: Vec<u8> },
    ServerSend { payload: Vec<u8> },
    TamperedClientSend { payload: Vec<u8>, position: u16, mask: u8 },
    UpdateClientKeys,
    UpdateServerKeys,
}

#[derive(Debug, Arbitrary)]
struct Input {
    suite: u8,
    seed: u64,
    truncated_hmac: bool,
    encrypt_then_mac: bool,
    ops: Vec<Op>,
}

const MAX_FRAGMENT: usize = 1 << 14;

fn content_type(raw: u8) -> ContentType {
    match raw % 3 {
        0 => ContentType::APPLICATION_DATA,
        1 => ContentType::HANDSHAKE,
        _ => ContentType::ALERT,
    }
}

fuzz_target!(|input: Input| {
    let suite = CipherSuite::ALL[usize::from(input.suite) % CipherSuite::ALL.len()];
    let version = if suite.is_tls13() { ProtocolVersion::TLSV13 } else { ProtocolVersion::TLSV12 };
    let mut pair = ConnectionPair::builder(suite, version)
        .seed(input.seed)
        .truncated_hmac(input.truncated_hmac)
        .encrypt_then_mac(input.encrypt_then_mac)
        .build()
        .expect("every suite builds at its own version");

    for op in input.ops.into_iter().take(32) {
        match op {
            Op::ClientSend { ref payload, .. }
            | Op::ServerSend { ref payload }
            | Op::TamperedClientSend { ref payload, .. }
                if payload.len() > MAX_FRAGMENT => {},
            Op::ClientSend { content_type: raw, payload } => {
                let limit = pair.client().protection().ciphertext_encode_limit(payload.len(), MAX_FRAGMENT);
                let mut wire = pair.client_mut().send(content_type(raw), &payload).expect("send");
                assert!(wire.len() - TLS_HEADER_LEN <= limit);

                let received = pair.server_mut().receive(&mut wire).expect("receive");
                assert_eq!(received.plaintext, payload);
                assert_eq!(received.content_type, content_type(raw));
            },
            Op::ServerSend { payload } => {
                let received =
                    pair.send_server_to_client(ContentType::APPLICATION_DATA, &payload).expect("server send");
                assert_eq!(received.plaintext, payload);
            },
            Op::TamperedClientSend { payload, position, mask } => {
                if suite.id == CipherSuite::NULL_WITH_NULL_NULL.id || mask == 0 {
                    continue;
                }
                let mut wire = pair.client_mut().send(ContentType::APPLICATION_DATA, &payload).expect("send");
                let fragment_len = wire.len() - TLS_HEADER_LEN;
                wire[TLS_HEADER_LEN + usize::from(position) % fragment_len] ^= mask;
                assert_eq!(pair.server_mut().receive(&mut wire), Err(RecordError::BadRecordMac));

                // The server never saw a good record at this sequence number
                return;
            },
            Op::UpdateClientKeys if suite.is_tls13() => {
                pair.update_client_traffic_secret().expect("key update");
            },
            Op::UpdateServerKeys if suite.is_tls13() => {
                pair.update_server_traffic_secret().expect("key update");
            },
            Op::UpdateClientKeys | Op::UpdateServerKeys => {},
        }
    }
});
