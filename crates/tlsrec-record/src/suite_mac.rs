//! Record MAC for the CBC and null ciphers.
//!
//! The MAC input is a version-specific header followed by the message:
//!
//! ```text
//! SSLv3            seq(8) || type(1) || length(2)
//! TLS/DTLS         seq(8) || type(1) || version(2) || length(2)
//! Connection ID    0xff * 8 || tls12_cid || cid_len || tls12_cid || version(2)
//!                  || seq(8) || cid || length(2)
//! ```
//!
//! # Security
//!
//! [`SuiteMac::calculate_mac_constant_time`] makes the number of hash
//! compression-function calls depend only on the record length, not on how
//! much of it was padding. That closes the Lucky13 timing channel between a
//! padding failure and a MAC failure in MAC-then-encrypt CBC.

use tlsrec_crypto::TlsHmac;
use tlsrec_proto::{ContentType, ProtocolVersion};

use crate::{additional_data, params::CryptoContext};

/// Truncated HMAC tag length (RFC 6066 §7).
pub const TRUNCATED_HMAC_LEN: usize = 10;

/// Per-direction record MAC.
#[derive(Clone)]
pub struct SuiteMac {
    version: ProtocolVersion,
    mac: TlsHmac,
    mac_size: usize,
    digest_block_size: usize,
    digest_overhead: usize,
}

impl SuiteMac {
    /// Wrap a keyed MAC with the header rules of `ctx`.
    pub fn new(ctx: &CryptoContext, mac: TlsHmac) -> Self {
        let native = mac.mac_len();
        let mac_size =
            if ctx.security_parameters().truncated_hmac() { native.min(TRUNCATED_HMAC_LEN) } else { native };
        Self {
            version: ctx.version(),
            digest_block_size: mac.block_len(),
            digest_overhead: mac.padding_overhead(),
            mac,
            mac_size,
        }
    }

    /// Tag length on the wire.
    pub fn size(&self) -> usize {
        self.mac_size
    }

    fn header(&self, seq_no: u64, record_type: ContentType, connection_id: &[u8], len: usize) -> Vec<u8> {
        if !connection_id.is_empty() {
            additional_data::connection_id(seq_no, self.version, connection_id, len)
        } else if self.version.is_ssl() {
            additional_data::ssl3(seq_no, record_type, len).to_vec()
        } else {
            additional_data::legacy(seq_no, record_type, self.version, len).to_vec()
        }
    }

    fn header_len(&self, connection_id: &[u8]) -> usize {
        if !connection_id.is_empty() {
            additional_data::CID_AAD_BASE_LEN + connection_id.len()
        } else if self.version.is_ssl() {
            additional_data::SSL3_HEADER_LEN
        } else {
            additional_data::LEGACY_AAD_LEN
        }
    }

    /// `MAC(header || message)`, truncated to [`Self::size`].
    pub fn calculate_mac(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        connection_id: &[u8],
        message: &[u8],
    ) -> Vec<u8> {
        let header = self.header(seq_no, record_type, connection_id, message.len());
        self.mac.update(&header);
        self.mac.update(message);
        let mut tag = self.mac.calculate_mac();
        tag.truncate(self.mac_size);
        tag
    }

    /// As [`Self::calculate_mac`], then run the hash over enough of
    /// `dummy_data` that the total compression work matches a message of
    /// `full_length` bytes.
    ///
    /// `dummy_data` must hold at least one digest block.
    pub fn calculate_mac_constant_time(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        connection_id: &[u8],
        message: &[u8],
        full_length: usize,
        dummy_data: &[u8],
    ) -> Vec<u8> {
        let tag = self.calculate_mac(seq_no, record_type, connection_id, message);

        let header_len = self.header_len(connection_id);
        let extra = self
            .digest_block_count(header_len + full_length)
            .saturating_sub(self.digest_block_count(header_len + message.len()));

        let block = dummy_data.get(..self.digest_block_size).unwrap_or(dummy_data);
        for _ in 0..extra {
            self.mac.update(block);
        }
        // One more byte so the final padding block is processed too
        self.mac.update(dummy_data.get(..1).unwrap_or_default());
        self.mac.reset();

        tag
    }

    fn digest_block_count(&self, len: usize) -> usize {
        (len + self.digest_overhead) / self.digest_block_size
    }
}

impl std::fmt::Debug for SuiteMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteMac")
            .field("version", &self.version)
            .field("algorithm", &self.mac.algorithm())
            .field("mac_size", &self.mac_size)
            .finish_non_exhaustive()
    }
}
