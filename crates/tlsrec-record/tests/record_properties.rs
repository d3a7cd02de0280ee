//! Property-based tests for record protection
//!
//! Every suite in the table is driven through a client/server pair built from
//! the same key material. The properties must hold for all plaintexts,
//! sequence numbers and content types, not just hand-picked ones.

use std::sync::Arc;

use proptest::prelude::*;
use tlsrec_crypto::{HashAlgorithm, MacAlgorithm, OsNonceGenerator, Secret};
use tlsrec_proto::{ConnectionEnd, ContentType, ProtocolVersion};
use tlsrec_record::{
    BulkCipher, CipherSuite, CryptoContext, RecordCipher, RecordError, RecordProtection, SecurityParameters,
    SecurityParametersBuilder,
};

const CLIENT_RANDOM: [u8; 32] = [0xc1; 32];
const SERVER_RANDOM: [u8; 32] = [0x5e; 32];

fn params(
    suite: &CipherSuite,
    version: ProtocolVersion,
    configure: fn(SecurityParametersBuilder) -> SecurityParametersBuilder,
) -> SecurityParameters {
    let builder = SecurityParameters::builder(version).prf_hash(suite.prf_hash);
    let builder = if version.is_tls13() {
        let len = suite.prf_hash.output_len();
        builder.traffic_secrets(Secret::new(vec![0x11; len]), Secret::new(vec![0x22; len]))
    } else {
        builder.master_secret(Secret::new(vec![0x33; 48]), CLIENT_RANDOM, SERVER_RANDOM)
    };
    configure(builder).build()
}

fn pair_with(
    suite: &CipherSuite,
    version: ProtocolVersion,
    configure: fn(SecurityParametersBuilder) -> SecurityParametersBuilder,
) -> (RecordProtection, RecordProtection) {
    let make = |end| {
        let ctx = Arc::new(CryptoContext::new(end, params(suite, version, configure), Arc::new(OsNonceGenerator)));
        RecordProtection::for_suite(ctx, suite).expect("suite should be constructible")
    };
    (make(ConnectionEnd::Client), make(ConnectionEnd::Server))
}

fn pair(suite: &CipherSuite) -> (RecordProtection, RecordProtection) {
    pair_with(suite, version_for(suite), |b| b)
}

fn version_for(suite: &CipherSuite) -> ProtocolVersion {
    if suite.is_tls13() { ProtocolVersion::TLSV13 } else { ProtocolVersion::TLSV12 }
}

/// Strategy for generating any suite in the table
fn arbitrary_suite() -> impl Strategy<Value = CipherSuite> {
    proptest::sample::select(CipherSuite::ALL)
}

/// Strategy for suites whose records are authenticated
fn authenticated_suite() -> impl Strategy<Value = CipherSuite> {
    proptest::sample::select(
        CipherSuite::ALL.iter().copied().filter(|s| s.id != CipherSuite::NULL_WITH_NULL_NULL.id).collect::<Vec<_>>(),
    )
}

fn arbitrary_content_type() -> impl Strategy<Value = ContentType> {
    prop_oneof![
        Just(ContentType::HANDSHAKE),
        Just(ContentType::APPLICATION_DATA),
        Just(ContentType::ALERT),
        Just(ContentType::CHANGE_CIPHER_SPEC),
    ]
}

#[test]
fn prop_round_trip_every_suite() {
    proptest!(|(
        suite in arbitrary_suite(),
        content_type in arbitrary_content_type(),
        seq_no in any::<u64>(),
        header_allocation in 0usize..16,
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
    )| {
        let version = version_for(&suite);
        let (mut client, mut server) = pair(&suite);

        let mut rec = client
            .encode(seq_no, content_type, version, header_allocation, &plaintext)
            .expect("encode should succeed");
        prop_assert_eq!(rec.offset, header_allocation);

        let (offset, len) = (rec.offset, rec.len);
        let decoded = server
            .decode(seq_no, rec.record_type, version, &mut rec.buf[offset..offset + len])
            .expect("decode should succeed");

        // PROPERTY: decode(encode(p)) == (p, content_type)
        prop_assert_eq!(decoded.plaintext, &plaintext[..]);
        prop_assert_eq!(decoded.content_type, content_type);
    });
}

#[test]
fn prop_server_to_client_round_trip() {
    proptest!(|(
        suite in arbitrary_suite(),
        seq_no in any::<u64>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
    )| {
        let version = version_for(&suite);
        let (mut client, mut server) = pair(&suite);

        let mut rec = server
            .encode(seq_no, ContentType::APPLICATION_DATA, version, 0, &plaintext)
            .expect("encode should succeed");
        let decoded = client
            .decode(seq_no, rec.record_type, version, &mut rec.buf)
            .expect("decode should succeed");
        prop_assert_eq!(decoded.plaintext, &plaintext[..]);
    });
}

#[test]
fn prop_encoded_length_within_encode_limit() {
    proptest!(|(
        suite in arbitrary_suite(),
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
    )| {
        let (mut client, _) = pair(&suite);
        let limit = client.ciphertext_encode_limit(plaintext.len(), 1 << 14);
        let rec = client
            .encode(0, ContentType::APPLICATION_DATA, version_for(&suite), 0, &plaintext)
            .expect("encode should succeed");

        // PROPERTY: the planning function never underestimates
        prop_assert!(rec.len <= limit, "{} produced {} > limit {}", suite, rec.len, limit);
    });
}

#[test]
fn prop_limit_inverse() {
    proptest!(|(suite in arbitrary_suite(), n in 0usize..=(1 << 14))| {
        let (client, server) = pair(&suite);

        // PROPERTY: plaintext_decode_limit(ciphertext_encode_limit(n)) >= n
        let ciphertext_limit = client.ciphertext_encode_limit(n, n);
        prop_assert!(server.plaintext_decode_limit(ciphertext_limit) >= n);
        prop_assert!(client.plaintext_decode_limit(ciphertext_limit) >= n);

        // PROPERTY: the decode bound admits whatever the encoder may produce
        prop_assert!(server.ciphertext_decode_limit(n) >= ciphertext_limit);
    });
}

#[test]
fn prop_single_bit_flip_is_bad_record_mac() {
    proptest!(|(
        suite in authenticated_suite(),
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        bit in any::<prop::sample::Index>(),
    )| {
        let version = version_for(&suite);
        let (mut client, mut server) = pair(&suite);

        let mut rec = client
            .encode(9, ContentType::APPLICATION_DATA, version, 0, &plaintext)
            .expect("encode should succeed");
        let bit = bit.index(rec.len * 8);
        rec.buf[bit / 8] ^= 1 << (bit % 8);

        // PROPERTY: any tampering is caught and reported identically
        prop_assert_eq!(server.decode(9, rec.record_type, version, &mut rec.buf), Err(RecordError::BadRecordMac));
    });
}

#[test]
fn prop_outer_record_type_is_authenticated() {
    proptest!(|(
        suite in authenticated_suite(),
        forged in arbitrary_content_type(),
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
    )| {
        let version = version_for(&suite);
        let (mut client, mut server) = pair(&suite);

        let mut rec = client
            .encode(2, ContentType::APPLICATION_DATA, version, 0, &plaintext)
            .expect("encode should succeed");
        prop_assume!(forged != rec.record_type);

        // PROPERTY: a rewritten header type never decodes
        prop_assert_eq!(server.decode(2, forged, version, &mut rec.buf), Err(RecordError::BadRecordMac));
    });
}

#[test]
fn prop_connection_id_round_trip() {
    proptest!(|(
        suite in authenticated_suite().prop_filter("legacy suites carry connection IDs", |s| !s.is_tls13()),
        content_type in arbitrary_content_type(),
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
    )| {
        let version = ProtocolVersion::DTLSV12;
        let make = |end: ConnectionEnd| {
            let configure: fn(SecurityParametersBuilder) -> SecurityParametersBuilder = if end.is_server() {
                |b| b.connection_ids(vec![0xbb, 0xbb], vec![0xaa])
            } else {
                |b| b.connection_ids(vec![0xaa], vec![0xbb, 0xbb])
            };
            let ctx = Arc::new(CryptoContext::new(end, params(&suite, version, configure), Arc::new(OsNonceGenerator)));
            RecordProtection::for_suite(ctx, &suite).expect("suite should be constructible")
        };
        let (mut client, mut server) = (make(ConnectionEnd::Client), make(ConnectionEnd::Server));

        let mut rec = client.encode(3, content_type, version, 13, &plaintext).expect("encode should succeed");
        // PROPERTY: the true type is hidden behind tls12_cid
        prop_assert_eq!(rec.record_type, ContentType::TLS12_CID);
        prop_assert!(server.uses_opaque_record_type());

        let (offset, len) = (rec.offset, rec.len);
        let decoded = server
            .decode(3, rec.record_type, version, &mut rec.buf[offset..offset + len])
            .expect("decode should succeed");
        prop_assert_eq!(decoded.plaintext, &plaintext[..]);
        prop_assert_eq!(decoded.content_type, content_type);
    });
}

#[test]
fn prop_block_suites_round_trip_on_every_legacy_version() {
    let block_suites: Vec<CipherSuite> =
        CipherSuite::ALL.iter().copied().filter(|s| matches!(s.bulk, BulkCipher::Block(_))).collect();
    let versions = [
        ProtocolVersion::SSLV3,
        ProtocolVersion::TLSV10,
        ProtocolVersion::TLSV11,
        ProtocolVersion::TLSV12,
        ProtocolVersion::DTLSV10,
        ProtocolVersion::DTLSV12,
    ];

    proptest!(|(
        suite in proptest::sample::select(block_suites.clone()),
        version in proptest::sample::select(versions.to_vec()),
        etm in any::<bool>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..600),
    )| {
        // The SSLv3 MAC only exists for MD5 and SHA-1
        prop_assume!(!version.is_ssl() || suite.mac == MacAlgorithm::Hmac(HashAlgorithm::Sha1));

        let configure: fn(SecurityParametersBuilder) -> SecurityParametersBuilder =
            if etm { |b| b.encrypt_then_mac(true).extended_padding(true) } else { |b| b };
        let (mut client, mut server) = pair_with(&suite, version, configure);

        // Two records so implicit-IV versions exercise chaining
        for seq_no in 0..2 {
            let mut rec = client
                .encode(seq_no, ContentType::APPLICATION_DATA, version, 0, &plaintext)
                .expect("encode should succeed");
            let decoded = server
                .decode(seq_no, rec.record_type, version, &mut rec.buf)
                .expect("decode should succeed");
            prop_assert_eq!(decoded.plaintext, &plaintext[..]);
        }
    });
}
