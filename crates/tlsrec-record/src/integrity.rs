//! Integrity-only TLS 1.3 protection (RFC 9150).
//!
//! ```text
//! record  = inner_plaintext || HMAC(nonce || aad || inner_plaintext)
//! nonce   = iv XOR seq_no        (hash-length IV)
//! aad     = opaque_type || legacy_version || length(inner + tag)
//! ```
//!
//! # Security
//!
//! Records are authenticated but travel in the clear. The HMAC key and IV
//! come from the traffic secrets exactly as AEAD keys do, so a key update
//! rotates them the same way.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tlsrec_crypto::{HashAlgorithm, MacAlgorithm, TlsHmac, key_schedule};
use tlsrec_proto::{ConnectionEnd, ContentType, ProtocolVersion};
use zeroize::Zeroizing;

use crate::{
    additional_data,
    contract::{DecodedRecord, EncodedRecord, RecordCipher},
    error::RecordError,
    nonce,
    params::CryptoContext,
};

struct Direction {
    mac: TlsHmac,
    iv: Zeroizing<Vec<u8>>,
}

impl Direction {
    fn derive(ctx: &CryptoContext, end: ConnectionEnd, hash: HashAlgorithm) -> Result<Self, RecordError> {
        let len = hash.output_len();
        let prefix = ctx.version().hkdf_label_prefix();
        let keys = ctx
            .security_parameters()
            .with_traffic_secret(end, |secret| key_schedule::derive_traffic_keys(secret, hash, prefix, len, len))
            .ok_or_else(|| RecordError::internal("integrity-only cipher requires a traffic secret"))??;
        Ok(Self { mac: TlsHmac::new(MacAlgorithm::Hmac(hash), &keys.key)?, iv: keys.iv })
    }

    fn tag(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        record_version: ProtocolVersion,
        inner: &[u8],
    ) -> Vec<u8> {
        let mut nonce = Zeroizing::new(vec![0u8; self.iv.len()]);
        nonce::write_implicit_nonce(&self.iv, seq_no, &mut nonce);

        let record_len = inner.len() + self.mac.mac_len();
        let aad = additional_data::tls13(record_type, record_version, record_len);

        self.mac.update(&nonce);
        self.mac.update(&aad);
        self.mac.update(inner);
        self.mac.calculate_mac()
    }
}

/// HMAC-SHA256 / HMAC-SHA384 record protection for TLS 1.3.
pub struct IntegrityOnlyCipher {
    ctx: Arc<CryptoContext>,
    hash: HashAlgorithm,
    encrypt: Direction,
    decrypt: Direction,
}

impl IntegrityOnlyCipher {
    /// Derive both directions from the traffic secrets.
    pub fn new(ctx: Arc<CryptoContext>, hash: HashAlgorithm) -> Result<Self, RecordError> {
        if !ctx.version().is_tls13() {
            return Err(RecordError::internal("integrity-only cipher suites require TLS 1.3"));
        }
        let encrypt = Direction::derive(&ctx, ctx.entity(), hash)?;
        let decrypt = Direction::derive(&ctx, ctx.entity().peer(), hash)?;

        tracing::debug!(?hash, version = %ctx.version(), "integrity-only record cipher initialized");

        Ok(Self { ctx, hash, encrypt, decrypt })
    }

    /// Hash behind the HMAC and the key schedule.
    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    fn overhead(&self) -> usize {
        self.hash.output_len() + 1
    }
}

impl RecordCipher for IntegrityOnlyCipher {
    fn ciphertext_decode_limit(&self, plaintext_limit: usize) -> usize {
        plaintext_limit + self.hash.output_len() + additional_data::MAX_INNER_PLAINTEXT_EXPANSION
    }

    fn ciphertext_encode_limit(&self, plaintext_length: usize, plaintext_limit: usize) -> usize {
        plaintext_length.min(plaintext_limit) + self.overhead()
    }

    fn plaintext_decode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit.saturating_sub(self.overhead())
    }

    fn plaintext_encode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit.saturating_sub(self.overhead())
    }

    fn encode(
        &mut self,
        seq_no: u64,
        content_type: ContentType,
        record_version: ProtocolVersion,
        header_allocation: usize,
        plaintext: &[u8],
    ) -> Result<EncodedRecord, RecordError> {
        let inner_len = plaintext.len() + 1;
        let total = inner_len + self.hash.output_len();

        let mut buf = vec![0u8; header_allocation + total];
        let inner_end = header_allocation + inner_len;
        buf[header_allocation..header_allocation + plaintext.len()].copy_from_slice(plaintext);
        buf[inner_end - 1] = content_type.to_u8();

        let tag = self.encrypt.tag(
            seq_no,
            ContentType::APPLICATION_DATA,
            record_version,
            &buf[header_allocation..inner_end],
        );
        buf[inner_end..].copy_from_slice(&tag);

        Ok(EncodedRecord {
            buf,
            offset: header_allocation,
            len: total,
            record_type: ContentType::APPLICATION_DATA,
        })
    }

    fn decode<'a>(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        record_version: ProtocolVersion,
        ciphertext: &'a mut [u8],
    ) -> Result<DecodedRecord<'a>, RecordError> {
        let mac_size = self.hash.output_len();
        if ciphertext.len() < mac_size + 1 {
            return Err(RecordError::DecodeError { reason: "record shorter than tag and content type" });
        }
        let inner_len = ciphertext.len() - mac_size;

        let expected = self.decrypt.tag(seq_no, record_type, record_version, &ciphertext[..inner_len]);
        if !bool::from(expected.ct_eq(&ciphertext[inner_len..])) {
            tracing::trace!(seq_no, "integrity-only record failed authentication");
            return Err(RecordError::BadRecordMac);
        }

        let (len, content_type) = additional_data::strip_inner_plaintext(&ciphertext[..inner_len])?;
        Ok(DecodedRecord { plaintext: &ciphertext[..len], content_type })
    }

    fn rekey_encoder(&mut self) -> Result<(), RecordError> {
        self.encrypt = Direction::derive(&self.ctx, self.ctx.entity(), self.hash)?;
        tracing::debug!(hash = ?self.hash, "integrity-only encoder rekeyed");
        Ok(())
    }

    fn rekey_decoder(&mut self) -> Result<(), RecordError> {
        self.decrypt = Direction::derive(&self.ctx, self.ctx.entity().peer(), self.hash)?;
        tracing::debug!(hash = ?self.hash, "integrity-only decoder rekeyed");
        Ok(())
    }

    fn uses_opaque_record_type(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for IntegrityOnlyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityOnlyCipher").field("hash", &self.hash).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tlsrec_crypto::{OsNonceGenerator, Secret};

    use super::*;
    use crate::params::SecurityParameters;

    fn pair(hash: HashAlgorithm) -> (IntegrityOnlyCipher, IntegrityOnlyCipher) {
        let make = |end| {
            let params = SecurityParameters::builder(ProtocolVersion::TLSV13)
                .prf_hash(hash)
                .traffic_secrets(Secret::new(vec![0x0c; hash.output_len()]), Secret::new(vec![0x05; hash.output_len()]))
                .build();
            let ctx = Arc::new(CryptoContext::new(end, params, Arc::new(OsNonceGenerator)));
            IntegrityOnlyCipher::new(ctx, hash).unwrap()
        };
        (make(ConnectionEnd::Client), make(ConnectionEnd::Server))
    }

    #[test]
    fn payload_travels_in_clear() {
        let (mut client, mut server) = pair(HashAlgorithm::Sha256);
        let mut rec = client.encode(0, ContentType::HANDSHAKE, ProtocolVersion::TLSV12, 0, b"visible").unwrap();
        assert_eq!(rec.record_type, ContentType::APPLICATION_DATA);
        assert_eq!(&rec.fragment()[..8], b"visible\x16");
        assert_eq!(rec.len, 8 + 32);

        let decoded = server.decode(0, rec.record_type, ProtocolVersion::TLSV12, &mut rec.buf).unwrap();
        assert_eq!(decoded.plaintext, b"visible");
        assert_eq!(decoded.content_type, ContentType::HANDSHAKE);
    }

    #[test]
    fn tag_binds_sequence_number() {
        let (mut client, mut server) = pair(HashAlgorithm::Sha384);
        let mut rec = client.encode(4, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, 0, b"x").unwrap();
        assert_eq!(
            server.decode(5, rec.record_type, ProtocolVersion::TLSV12, &mut rec.buf),
            Err(RecordError::BadRecordMac)
        );
    }

    #[test]
    fn tag_binds_outer_record_type() {
        let (mut client, mut server) = pair(HashAlgorithm::Sha256);
        let mut rec = client.encode(0, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, 0, b"data").unwrap();
        assert_eq!(
            server.decode(0, ContentType::HANDSHAKE, ProtocolVersion::TLSV12, &mut rec.buf),
            Err(RecordError::BadRecordMac)
        );
    }

    #[test]
    fn fully_padded_record_fits_decode_limit() {
        let (mut client, mut server) = pair(HashAlgorithm::Sha256);
        let mut inner = vec![0x61; 1 << 14];
        inner.push(ContentType::APPLICATION_DATA.to_u8());
        inner.resize(inner.len() + 255, 0);
        let tag = client.encrypt.tag(3, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, &inner);
        let mut record = [inner, tag].concat();

        assert_eq!(record.len(), server.ciphertext_decode_limit(1 << 14));
        let decoded = server.decode(3, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, &mut record).unwrap();
        assert_eq!(decoded.plaintext.len(), 1 << 14);
        assert_eq!(decoded.content_type, ContentType::APPLICATION_DATA);
    }

    #[test]
    fn short_record_is_decode_error() {
        let (_, mut server) = pair(HashAlgorithm::Sha256);
        let mut short = [0u8; 32];
        assert!(matches!(
            server.decode(0, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, &mut short),
            Err(RecordError::DecodeError { .. })
        ));
    }

    #[test]
    fn legacy_version_is_rejected() {
        let params = SecurityParameters::builder(ProtocolVersion::TLSV12).build();
        let ctx = Arc::new(CryptoContext::new(ConnectionEnd::Client, params, Arc::new(OsNonceGenerator)));
        assert!(matches!(
            IntegrityOnlyCipher::new(ctx, HashAlgorithm::Sha256),
            Err(RecordError::InternalError { .. })
        ));
    }

    #[test]
    fn always_opaque() {
        let (client, _) = pair(HashAlgorithm::Sha256);
        assert!(client.uses_opaque_record_type());
    }
}
