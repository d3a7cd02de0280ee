//! Property-based tests for protocol version parsing.
//!
//! Arbitrary 16-bit values either parse into a version that re-encodes to the
//! same value, or are rejected. Nothing in between.

use proptest::prelude::*;
use tlsrec_proto::{ProtocolError, ProtocolVersion};

#[test]
fn prop_version_parse_is_exact() {
    proptest!(|(value in any::<u16>())| {
        match ProtocolVersion::from_u16(value) {
            Ok(version) => {
                // PROPERTY: accepted values re-encode losslessly
                prop_assert_eq!(version.to_u16(), value);
                prop_assert!(ProtocolVersion::ALL.contains(&version));
            },
            Err(ProtocolError::UnknownVersion { major, minor }) => {
                prop_assert_eq!(u16::from_be_bytes([major, minor]), value);
            },
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    });
}

#[test]
fn tls_equivalent_is_idempotent() {
    for version in ProtocolVersion::ALL {
        let tls = version.tls_equivalent();
        assert!(!tls.is_dtls(), "{version} maps to a DTLS version");
        assert_eq!(tls.tls_equivalent(), tls);
    }
}
