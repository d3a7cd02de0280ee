//! Record content types.

use std::fmt;

/// Record content type byte.
///
/// Kept as a newtype rather than an enum: the inner content type recovered
/// from a decrypted TLS 1.3 record can be any non-zero byte, and the record
/// ciphers pass it through without judging it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentType(pub u8);

impl ContentType {
    /// `change_cipher_spec` (20)
    pub const CHANGE_CIPHER_SPEC: Self = Self(20);
    /// alert (21)
    pub const ALERT: Self = Self(21);
    /// handshake (22)
    pub const HANDSHAKE: Self = Self(22);
    /// `application_data` (23), the opaque outer type of TLS 1.3 records
    pub const APPLICATION_DATA: Self = Self(23);
    /// heartbeat (24)
    pub const HEARTBEAT: Self = Self(24);
    /// `tls12_cid` (25), the outer type of records carrying a connection ID
    pub const TLS12_CID: Self = Self(25);
    /// ack (26), DTLS 1.3
    pub const ACK: Self = Self(26);

    /// Raw byte value.
    pub fn to_u8(self) -> u8 {
        self.0
    }
}

impl From<u8> for ContentType {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            20 => f.write_str("change_cipher_spec"),
            21 => f.write_str("alert"),
            22 => f.write_str("handshake"),
            23 => f.write_str("application_data"),
            24 => f.write_str("heartbeat"),
            25 => f.write_str("tls12_cid"),
            26 => f.write_str("ack"),
            other => write!(f, "content_type({other})"),
        }
    }
}
