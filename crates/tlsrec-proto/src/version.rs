//! Protocol versions as they appear on the wire.
//!
//! DTLS versions count downwards (DTLS 1.2 is `0xFEFD`, DTLS 1.3 is `0xFEFC`),
//! so ordering is only meaningful after mapping a DTLS version to the TLS
//! version it is derived from. All feature predicates go through that mapping.

use std::fmt;

use crate::errors::{ProtocolError, Result};

/// A TLS or DTLS protocol version (two bytes, big endian on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolVersion {
    major: u8,
    minor: u8,
}

impl ProtocolVersion {
    /// SSL 3.0
    pub const SSLV3: Self = Self::from_bytes(0x03, 0x00);
    /// TLS 1.0
    pub const TLSV10: Self = Self::from_bytes(0x03, 0x01);
    /// TLS 1.1
    pub const TLSV11: Self = Self::from_bytes(0x03, 0x02);
    /// TLS 1.2
    pub const TLSV12: Self = Self::from_bytes(0x03, 0x03);
    /// TLS 1.3
    pub const TLSV13: Self = Self::from_bytes(0x03, 0x04);
    /// DTLS 1.0 (derived from TLS 1.1)
    pub const DTLSV10: Self = Self::from_bytes(0xFE, 0xFF);
    /// DTLS 1.2
    pub const DTLSV12: Self = Self::from_bytes(0xFE, 0xFD);
    /// DTLS 1.3
    pub const DTLSV13: Self = Self::from_bytes(0xFE, 0xFC);

    /// Every version the record ciphers know about.
    pub const ALL: [Self; 8] = [
        Self::SSLV3,
        Self::TLSV10,
        Self::TLSV11,
        Self::TLSV12,
        Self::TLSV13,
        Self::DTLSV10,
        Self::DTLSV12,
        Self::DTLSV13,
    ];

    const fn from_bytes(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parse a supported version from its wire bytes.
    pub fn new(major: u8, minor: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.major == major && v.minor == minor)
            .ok_or(ProtocolError::UnknownVersion { major, minor })
    }

    /// Parse a supported version from its 16-bit wire value.
    pub fn from_u16(value: u16) -> Result<Self> {
        let [major, minor] = value.to_be_bytes();
        Self::new(major, minor)
    }

    /// Major version byte.
    pub fn major(self) -> u8 {
        self.major
    }

    /// Minor version byte.
    pub fn minor(self) -> u8 {
        self.minor
    }

    /// Wire encoding (major, minor).
    pub fn to_bytes(self) -> [u8; 2] {
        [self.major, self.minor]
    }

    /// 16-bit wire value.
    pub fn to_u16(self) -> u16 {
        u16::from_be_bytes(self.to_bytes())
    }

    /// True for any DTLS version.
    pub fn is_dtls(self) -> bool {
        self.major == 0xFE
    }

    /// True for SSL 3.0, which uses the 11-byte MAC header and SSLv3 MAC.
    pub fn is_ssl(self) -> bool {
        self == Self::SSLV3
    }

    /// The TLS version a DTLS version is based on; TLS versions map to
    /// themselves.
    #[must_use]
    pub fn tls_equivalent(self) -> Self {
        match self {
            v if v == Self::DTLSV10 => Self::TLSV11,
            v if v == Self::DTLSV12 => Self::TLSV12,
            v if v == Self::DTLSV13 => Self::TLSV13,
            v => v,
        }
    }

    /// Ordering across families, via [`Self::tls_equivalent`].
    pub fn is_equal_or_later_than(self, other: Self) -> bool {
        self.tls_equivalent().minor >= other.tls_equivalent().minor
    }

    /// TLS 1.3 or DTLS 1.3.
    pub fn is_tls13(self) -> bool {
        self.is_equal_or_later_than(Self::TLSV13)
    }

    /// TLS 1.2 or DTLS 1.2 exactly.
    pub fn is_tls12(self) -> bool {
        self.tls_equivalent() == Self::TLSV12
    }

    /// CBC records carry a per-record explicit IV from TLS 1.1 (and in every
    /// DTLS version) onwards.
    pub fn uses_explicit_iv(self) -> bool {
        self.is_equal_or_later_than(Self::TLSV11)
    }

    /// Label prefix for HKDF-Expand-Label: `"tls13 "`, or `"dtls13"` for
    /// DTLS 1.3 (RFC 9147 §5.9).
    pub fn hkdf_label_prefix(self) -> &'static [u8] {
        if self.is_dtls() { b"dtls13" } else { b"tls13 " }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            v if v == Self::SSLV3 => "SSLv3",
            v if v == Self::TLSV10 => "TLSv1.0",
            v if v == Self::TLSV11 => "TLSv1.1",
            v if v == Self::TLSV12 => "TLSv1.2",
            v if v == Self::TLSV13 => "TLSv1.3",
            v if v == Self::DTLSV10 => "DTLSv1.0",
            v if v == Self::DTLSV12 => "DTLSv1.2",
            _ => "DTLSv1.3",
        };
        f.write_str(name)
    }
}
