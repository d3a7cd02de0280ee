//! Fuzz target for record decoding
//!
//! Frames attacker-controlled fragments with a well-formed header and hands
//! them to the receiving endpoint of every suite, so the bytes reach the
//! cipher's length, padding and tag checks.
//!
//! # Invariants
//!
//! - NEVER panic, whatever the length, padding or tag
//! - A fragment the sender never produced is rejected by every suite that
//!   authenticates its records

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tlsrec_harness::{ConnectionPair, RecordHeader};
use tlsrec_proto::{ContentType, ProtocolVersion};
use tlsrec_record::CipherSuite;

#[derive(Debug, Arbitrary)]
struct Input {
    suite: u8,
    dtls: bool,
    encrypt_then_mac: bool,
    extended_padding: bool,
    record_type: u8,
    sequence: u64,
    fragment: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let suite = CipherSuite::ALL[usize::from(input.suite) % CipherSuite::ALL.len()];
    let (version, record_version) = match (suite.is_tls13(), input.dtls) {
        (true, false) => (ProtocolVersion::TLSV13, ProtocolVersion::TLSV12),
        (true, true) => (ProtocolVersion::DTLSV13, ProtocolVersion::DTLSV12),
        (false, false) => (ProtocolVersion::TLSV12, ProtocolVersion::TLSV12),
        (false, true) => (ProtocolVersion::DTLSV12, ProtocolVersion::DTLSV12),
    };
    if input.fragment.len() > usize::from(u16::MAX) {
        return;
    }

    let mut pair = ConnectionPair::builder(suite, version)
        .encrypt_then_mac(input.encrypt_then_mac)
        .extended_padding(input.extended_padding)
        .seed(0)
        .build()
        .expect("every suite builds at its own version");

    let header = RecordHeader {
        content_type: ContentType::from(input.record_type),
        version: record_version,
        // Epoch 0 so DTLS records get past the epoch check
        sequence: input.dtls.then_some(input.sequence & 0xFFFF_FFFF_FFFF),
        connection_id: Vec::new(),
        length: input.fragment.len(),
    };
    if header.content_type == ContentType::TLS12_CID {
        return;
    }

    let mut wire = vec![0u8; header.encoded_len()];
    header.write(&mut wire).expect("header fits");
    wire.extend_from_slice(&input.fragment);

    let result = pair.server_mut().receive(&mut wire);
    if suite.id != CipherSuite::NULL_WITH_NULL_NULL.id {
        assert!(result.is_err(), "{suite} accepted a forged record");
    }
});
