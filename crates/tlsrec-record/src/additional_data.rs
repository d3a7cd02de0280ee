//! Additional-data layouts and the inner plaintext wrapper.
//!
//! ```text
//! TLS 1.3 (RFC 8446 §5.2)         opaque_type(1) || legacy_version(2) || length(2)
//! TLS <= 1.2 (RFC 5246 §6.2.3.3)  seq_num(8) || type(1) || version(2) || length(2)
//! Connection ID (RFC 9146 §5)     0xff * 8 || tls12_cid(1) || cid_length(1)
//!                                 || tls12_cid(1) || version(2) || seq_num(8)
//!                                 || cid || length(2)
//! ```
//!
//! The same 13-byte and CID layouts head the MAC input of the CBC and null
//! ciphers.

use tlsrec_proto::{ContentType, ProtocolVersion};

use crate::error::RecordError;

/// Size of the TLS 1.3 additional data.
pub const TLS13_AAD_LEN: usize = 5;

/// Size of the pre-1.3 additional data and MAC header.
pub const LEGACY_AAD_LEN: usize = 13;

/// Size of the SSLv3 MAC header (no version field).
pub const SSL3_HEADER_LEN: usize = 11;

/// Size of the connection ID layout without the ID itself.
pub const CID_AAD_BASE_LEN: usize = 23;

/// Most bytes an inner plaintext may add to its payload: the content type
/// and up to 255 bytes of zero padding (RFC 8446 §5.2 allows `2^14 + 256`).
pub const MAX_INNER_PLAINTEXT_EXPANSION: usize = 256;

/// Bytes a decoder must allow on top of the payload limit.
pub(crate) fn inner_plaintext_decode_allowance(use_inner_plaintext: bool) -> usize {
    if use_inner_plaintext { MAX_INNER_PLAINTEXT_EXPANSION } else { 0 }
}

/// TLS 1.3 additional data: the outer record header.
pub fn tls13(record_type: ContentType, record_version: ProtocolVersion, ciphertext_len: usize) -> [u8; TLS13_AAD_LEN] {
    let v = record_version.to_bytes();
    let len = (ciphertext_len as u16).to_be_bytes();
    [record_type.to_u8(), v[0], v[1], len[0], len[1]]
}

/// Pre-1.3 additional data.
pub fn legacy(
    seq_no: u64,
    record_type: ContentType,
    record_version: ProtocolVersion,
    plaintext_len: usize,
) -> [u8; LEGACY_AAD_LEN] {
    let mut aad = [0u8; LEGACY_AAD_LEN];
    aad[..8].copy_from_slice(&seq_no.to_be_bytes());
    aad[8] = record_type.to_u8();
    aad[9..11].copy_from_slice(&record_version.to_bytes());
    aad[11..].copy_from_slice(&(plaintext_len as u16).to_be_bytes());
    aad
}

/// SSLv3 MAC header.
pub fn ssl3(seq_no: u64, record_type: ContentType, len: usize) -> [u8; SSL3_HEADER_LEN] {
    let mut header = [0u8; SSL3_HEADER_LEN];
    header[..8].copy_from_slice(&seq_no.to_be_bytes());
    header[8] = record_type.to_u8();
    header[9..].copy_from_slice(&(len as u16).to_be_bytes());
    header
}

/// Connection ID additional data (RFC 9146).
///
/// The leading sequence number is an all-ones placeholder; the real one
/// follows the version.
pub fn connection_id(
    seq_no: u64,
    record_version: ProtocolVersion,
    connection_id: &[u8],
    inner_len: usize,
) -> Vec<u8> {
    let cid_type = ContentType::TLS12_CID.to_u8();
    let mut aad = Vec::with_capacity(CID_AAD_BASE_LEN + connection_id.len());
    aad.extend_from_slice(&[0xff; 8]);
    aad.push(cid_type);
    aad.push(connection_id.len() as u8);
    aad.push(cid_type);
    aad.extend_from_slice(&record_version.to_bytes());
    aad.extend_from_slice(&seq_no.to_be_bytes());
    aad.extend_from_slice(connection_id);
    aad.extend_from_slice(&(inner_len as u16).to_be_bytes());
    aad
}

/// Additional data for an AEAD record.
///
/// TLS 1.3 binds the ciphertext length; earlier versions bind the
/// (inner) plaintext length.
pub(crate) fn for_aead(
    is_tls13: bool,
    seq_no: u64,
    record_type: ContentType,
    record_version: ProtocolVersion,
    connection_id: &[u8],
    ciphertext_len: usize,
    plaintext_len: usize,
) -> Vec<u8> {
    if is_tls13 {
        tls13(record_type, record_version, ciphertext_len).to_vec()
    } else if connection_id.is_empty() {
        legacy(seq_no, record_type, record_version, plaintext_len).to_vec()
    } else {
        self::connection_id(seq_no, record_version, connection_id, plaintext_len)
    }
}

/// Recover the true content type from an inner plaintext.
///
/// Scans backward past zero padding to the first non-zero byte, which is the
/// content type. Returns the payload length and that type.
pub(crate) fn strip_inner_plaintext(buf: &[u8]) -> Result<(usize, ContentType), RecordError> {
    let Some(pos) = buf.iter().rposition(|&b| b != 0) else {
        return Err(RecordError::UnexpectedMessage { reason: "inner plaintext has no content type" });
    };
    Ok((pos, ContentType::from(buf[pos])))
}

/// Outer record type for a record that may carry an inner plaintext.
pub(crate) fn outer_record_type(is_tls13: bool, connection_id: &[u8], content_type: ContentType) -> ContentType {
    if is_tls13 {
        ContentType::APPLICATION_DATA
    } else if !connection_id.is_empty() {
        ContentType::TLS12_CID
    } else {
        content_type
    }
}
