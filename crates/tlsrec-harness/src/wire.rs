//! Record headers for the harness wire format.
//!
//! ```text
//! TLS             type(1) || version(2) || length(2)
//! DTLS            type(1) || version(2) || epoch(2) || seq(6) || length(2)
//! DTLS + CID      type(1) || version(2) || epoch(2) || seq(6) || cid || length(2)
//! ```
//!
//! The CID form (RFC 9146) is used only when the type is `tls12_cid`. For
//! DTLS, `epoch || seq` is exactly the big-endian `u64` the record ciphers
//! take as their sequence number.

use tlsrec_proto::{ContentType, ProtocolVersion};
use tlsrec_record::RecordError;

/// TLS record header length.
pub const TLS_HEADER_LEN: usize = 5;

/// DTLS record header length without a connection ID.
pub const DTLS_HEADER_LEN: usize = 13;

/// A parsed or to-be-written record header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Outer content type
    pub content_type: ContentType,
    /// Record-layer version
    pub version: ProtocolVersion,
    /// `epoch || seq` (DTLS only)
    pub sequence: Option<u64>,
    /// Connection ID carried in the header (DTLS `tls12_cid` records only)
    pub connection_id: Vec<u8>,
    /// Fragment length
    pub length: usize,
}

impl RecordHeader {
    /// Encoded length of this header.
    pub fn encoded_len(&self) -> usize {
        match self.sequence {
            Some(_) => DTLS_HEADER_LEN + self.connection_id.len(),
            None => TLS_HEADER_LEN,
        }
    }

    /// Write into `out`, which must be exactly [`Self::encoded_len`] bytes.
    pub fn write(&self, out: &mut [u8]) -> Result<(), RecordError> {
        let Ok(length) = u16::try_from(self.length) else {
            return Err(RecordError::InternalError { reason: format!("fragment of {} bytes", self.length) });
        };
        if out.len() != self.encoded_len() {
            return Err(RecordError::InternalError { reason: "header buffer has the wrong size".to_string() });
        }

        out[0] = self.content_type.to_u8();
        out[1..3].copy_from_slice(&self.version.to_bytes());
        let mut off = 3;
        if let Some(sequence) = self.sequence {
            out[off..off + 8].copy_from_slice(&sequence.to_be_bytes());
            off += 8;
            out[off..off + self.connection_id.len()].copy_from_slice(&self.connection_id);
            off += self.connection_id.len();
        }
        out[off..off + 2].copy_from_slice(&length.to_be_bytes());
        Ok(())
    }

    /// Parse the header at the start of `buf`.
    ///
    /// `cid_len` is the length of the connection ID this endpoint expects in
    /// `tls12_cid` records.
    pub fn parse(buf: &[u8], dtls: bool, cid_len: usize) -> Result<Self, RecordError> {
        let too_short = RecordError::DecodeError { reason: "truncated record header" };
        let Some(&type_byte) = buf.first() else {
            return Err(too_short);
        };
        let content_type = ContentType::from(type_byte);

        let header_len = if !dtls {
            TLS_HEADER_LEN
        } else if content_type == ContentType::TLS12_CID {
            DTLS_HEADER_LEN + cid_len
        } else {
            DTLS_HEADER_LEN
        };
        if buf.len() < header_len {
            return Err(too_short);
        }

        let version = ProtocolVersion::new(buf[1], buf[2])
            .map_err(|_| RecordError::DecodeError { reason: "unknown record version" })?;

        let (sequence, connection_id) = if dtls {
            let mut seq = [0u8; 8];
            seq.copy_from_slice(&buf[3..11]);
            (Some(u64::from_be_bytes(seq)), buf[11..header_len - 2].to_vec())
        } else {
            (None, Vec::new())
        };
        let length = usize::from(u16::from_be_bytes([buf[header_len - 2], buf[header_len - 1]]));

        Ok(Self { content_type, version, sequence, connection_id, length })
    }
}
