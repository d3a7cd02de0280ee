//! One side of a simulated connection.

use std::sync::Arc;

use tlsrec_proto::{ConnectionEnd, ContentType, ProtocolVersion};
use tlsrec_record::{CryptoContext, RecordCipher, RecordError, RecordProtection};

use crate::wire::{DTLS_HEADER_LEN, RecordHeader, TLS_HEADER_LEN};

/// A record the endpoint accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// True content type
    pub content_type: ContentType,
    /// Recovered payload
    pub plaintext: Vec<u8>,
}

/// Record protection plus the per-direction counters a record layer keeps.
///
/// TLS sequence numbers are implicit and counted here. DTLS sequence numbers
/// travel in the header as `epoch || seq`; a key update bumps the epoch.
#[derive(Debug)]
pub struct Endpoint {
    ctx: Arc<CryptoContext>,
    protection: RecordProtection,
    record_version: ProtocolVersion,
    write_epoch: u16,
    read_epoch: u16,
    write_seq: u64,
    read_seq: u64,
}

/// Version written in record headers; TLS 1.3 and DTLS 1.3 keep the 1.2 value.
fn legacy_record_version(version: ProtocolVersion) -> ProtocolVersion {
    if version == ProtocolVersion::TLSV13 {
        ProtocolVersion::TLSV12
    } else if version == ProtocolVersion::DTLSV13 {
        ProtocolVersion::DTLSV12
    } else {
        version
    }
}

impl Endpoint {
    pub(crate) fn new(ctx: Arc<CryptoContext>, protection: RecordProtection) -> Self {
        let record_version = legacy_record_version(ctx.version());
        Self { ctx, protection, record_version, write_epoch: 0, read_epoch: 0, write_seq: 0, read_seq: 0 }
    }

    /// Which end this is.
    pub fn end(&self) -> ConnectionEnd {
        self.ctx.entity()
    }

    /// Crypto context shared with the cipher.
    pub fn context(&self) -> &Arc<CryptoContext> {
        &self.ctx
    }

    /// Record protection in use.
    pub fn protection(&self) -> &RecordProtection {
        &self.protection
    }

    /// Next outgoing sequence number (without the epoch).
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Next expected incoming sequence number (without the epoch).
    pub fn read_seq(&self) -> u64 {
        self.read_seq
    }

    fn is_dtls(&self) -> bool {
        self.ctx.version().is_dtls()
    }

    fn packed(&self, epoch: u16, seq: u64) -> u64 {
        if self.is_dtls() { (u64::from(epoch) << 48) | (seq & 0xFFFF_FFFF_FFFF) } else { seq }
    }

    /// Protect `plaintext` and frame it with a record header.
    pub fn send(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Vec<u8>, RecordError> {
        let seq_no = self.packed(self.write_epoch, self.write_seq);
        let peer_cid = self.ctx.security_parameters().connection_id_peer();

        // Room for the largest header; the real one is right-aligned against
        // the fragment once the outer type is known
        let header_allocation =
            if self.is_dtls() { DTLS_HEADER_LEN + peer_cid.len() } else { TLS_HEADER_LEN };

        let mut rec =
            self.protection.encode(seq_no, content_type, self.record_version, header_allocation, plaintext)?;

        let dtls_cid = self.is_dtls() && rec.record_type == ContentType::TLS12_CID;
        let header = RecordHeader {
            content_type: rec.record_type,
            version: self.record_version,
            sequence: self.is_dtls().then_some(seq_no),
            connection_id: if dtls_cid { peer_cid.to_vec() } else { Vec::new() },
            length: rec.len,
        };
        let start = rec.offset - header.encoded_len();
        header.write(&mut rec.buf[start..rec.offset])?;

        tracing::trace!(?content_type, seq_no, len = rec.len, "record sent");
        self.write_seq += 1;
        Ok(rec.buf.split_off(start))
    }

    /// Parse, check and unprotect one framed record.
    ///
    /// `wire` is decoded in place.
    pub fn receive(&mut self, wire: &mut [u8]) -> Result<Received, RecordError> {
        let local_cid_len = self.ctx.security_parameters().connection_id_local().len();
        let header = RecordHeader::parse(wire, self.is_dtls(), local_cid_len)?;
        let header_len = header.encoded_len();

        if header.version != self.record_version {
            return Err(RecordError::DecodeError { reason: "unexpected record version" });
        }
        if wire.len() - header_len != header.length {
            return Err(RecordError::DecodeError { reason: "record length does not match header" });
        }

        let seq_no = match header.sequence {
            Some(packed) => {
                if (packed >> 48) as u16 != self.read_epoch {
                    return Err(RecordError::UnexpectedMessage { reason: "record from another epoch" });
                }
                packed
            },
            None => self.read_seq,
        };

        let decoded =
            self.protection.decode(seq_no, header.content_type, self.record_version, &mut wire[header_len..])?;
        let received = Received { content_type: decoded.content_type, plaintext: decoded.plaintext.to_vec() };

        tracing::trace!(content_type = ?received.content_type, seq_no, "record received");
        self.read_seq += 1;
        Ok(received)
    }

    /// Advance our own traffic secret and rekey the encoder.
    pub fn update_write_keys(&mut self) -> Result<(), RecordError> {
        self.ctx.security_parameters().update_traffic_secret(self.end())?;
        self.protection.rekey_encoder()?;
        self.write_epoch = self.write_epoch.wrapping_add(1);
        self.write_seq = 0;
        tracing::debug!(end = ?self.end(), epoch = self.write_epoch, "write keys updated");
        Ok(())
    }

    /// Advance the peer's traffic secret and rekey the decoder.
    pub fn update_read_keys(&mut self) -> Result<(), RecordError> {
        self.ctx.security_parameters().update_traffic_secret(self.end().peer())?;
        self.protection.rekey_decoder()?;
        self.read_epoch = self.read_epoch.wrapping_add(1);
        self.read_seq = 0;
        tracing::debug!(end = ?self.end(), epoch = self.read_epoch, "read keys updated");
        Ok(())
    }
}
