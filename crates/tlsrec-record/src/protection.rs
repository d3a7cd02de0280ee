//! Closed dispatch over the four record cipher families.

use std::sync::Arc;

use tlsrec_crypto::MacAlgorithm;
use tlsrec_proto::{ContentType, ProtocolVersion};

use crate::{
    aead::AeadRecordCipher,
    block::BlockRecordCipher,
    contract::{DecodedRecord, EncodedRecord, RecordCipher},
    error::RecordError,
    integrity::IntegrityOnlyCipher,
    null::NullRecordCipher,
    params::CryptoContext,
    suite::{BulkCipher, CipherSuite},
};

/// Record protection for a negotiated cipher suite.
///
/// Large cipher state is boxed so the enum stays pointer-sized per variant.
#[derive(Debug)]
pub enum RecordProtection {
    /// GCM, CCM or ChaCha20-Poly1305
    Aead(Box<AeadRecordCipher>),
    /// CBC with HMAC
    Block(Box<BlockRecordCipher>),
    /// MAC only, or nothing at all
    Null(Box<NullRecordCipher>),
    /// TLS 1.3 HMAC-only
    IntegrityOnly(Box<IntegrityOnlyCipher>),
}

impl RecordProtection {
    /// Build the cipher `suite` calls for under the context's version.
    ///
    /// Fails with `InternalError` when the suite cannot run on that version.
    pub fn for_suite(ctx: Arc<CryptoContext>, suite: &CipherSuite) -> Result<Self, RecordError> {
        let version = ctx.version();
        if suite.is_tls13() != version.is_tls13() {
            return Err(RecordError::internal(format!("{suite} cannot protect {version} records")));
        }

        // SSLv3 uses its own MAC construction over the same hash
        let mac = match suite.mac {
            MacAlgorithm::Hmac(hash) if version.is_ssl() => MacAlgorithm::Ssl3(hash),
            mac => mac,
        };

        tracing::debug!(suite = %suite, version = %version, "selecting record protection");

        Ok(match suite.bulk {
            BulkCipher::Null if mac == MacAlgorithm::Null => Self::Null(Box::new(NullRecordCipher::passthrough())),
            BulkCipher::Null => Self::Null(Box::new(NullRecordCipher::new(ctx, mac)?)),
            BulkCipher::Block(algorithm) => Self::Block(Box::new(BlockRecordCipher::new(ctx, algorithm, mac)?)),
            BulkCipher::Aead(algorithm) => Self::Aead(Box::new(AeadRecordCipher::new(ctx, algorithm)?)),
            BulkCipher::IntegrityOnly(hash) => {
                Self::IntegrityOnly(Box::new(IntegrityOnlyCipher::new(ctx, hash)?))
            },
        })
    }

    fn inner(&self) -> &dyn RecordCipher {
        match self {
            Self::Aead(c) => c.as_ref(),
            Self::Block(c) => c.as_ref(),
            Self::Null(c) => c.as_ref(),
            Self::IntegrityOnly(c) => c.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn RecordCipher {
        match self {
            Self::Aead(c) => c.as_mut(),
            Self::Block(c) => c.as_mut(),
            Self::Null(c) => c.as_mut(),
            Self::IntegrityOnly(c) => c.as_mut(),
        }
    }
}

impl RecordCipher for RecordProtection {
    fn ciphertext_decode_limit(&self, plaintext_limit: usize) -> usize {
        self.inner().ciphertext_decode_limit(plaintext_limit)
    }

    fn ciphertext_encode_limit(&self, plaintext_length: usize, plaintext_limit: usize) -> usize {
        self.inner().ciphertext_encode_limit(plaintext_length, plaintext_limit)
    }

    fn plaintext_decode_limit(&self, ciphertext_limit: usize) -> usize {
        self.inner().plaintext_decode_limit(ciphertext_limit)
    }

    fn plaintext_encode_limit(&self, ciphertext_limit: usize) -> usize {
        self.inner().plaintext_encode_limit(ciphertext_limit)
    }

    fn encode(
        &mut self,
        seq_no: u64,
        content_type: ContentType,
        record_version: ProtocolVersion,
        header_allocation: usize,
        plaintext: &[u8],
    ) -> Result<EncodedRecord, RecordError> {
        self.inner_mut().encode(seq_no, content_type, record_version, header_allocation, plaintext)
    }

    fn decode<'a>(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        record_version: ProtocolVersion,
        ciphertext: &'a mut [u8],
    ) -> Result<DecodedRecord<'a>, RecordError> {
        self.inner_mut().decode(seq_no, record_type, record_version, ciphertext)
    }

    fn rekey_encoder(&mut self) -> Result<(), RecordError> {
        self.inner_mut().rekey_encoder()
    }

    fn rekey_decoder(&mut self) -> Result<(), RecordError> {
        self.inner_mut().rekey_decoder()
    }

    fn uses_opaque_record_type(&self) -> bool {
        self.inner().uses_opaque_record_type()
    }
}

#[cfg(test)]
mod tests {
    use tlsrec_crypto::{HashAlgorithm, OsNonceGenerator, Secret};
    use tlsrec_proto::ConnectionEnd;

    use super::*;
    use crate::params::SecurityParameters;

    fn legacy_ctx(version: ProtocolVersion) -> Arc<CryptoContext> {
        let params = SecurityParameters::builder(version)
            .master_secret(Secret::new(vec![0x66; 48]), [7; 32], [8; 32])
            .build();
        Arc::new(CryptoContext::new(ConnectionEnd::Client, params, Arc::new(OsNonceGenerator)))
    }

    #[test]
    fn null_null_is_passthrough() {
        let protection =
            RecordProtection::for_suite(legacy_ctx(ProtocolVersion::TLSV12), &CipherSuite::NULL_WITH_NULL_NULL)
                .unwrap();
        assert!(matches!(protection, RecordProtection::Null(_)));
        assert_eq!(protection.ciphertext_encode_limit(100, 1 << 14), 100);
    }

    #[test]
    fn variant_follows_bulk_cipher() {
        let ctx = legacy_ctx(ProtocolVersion::TLSV12);
        let cbc = RecordProtection::for_suite(ctx.clone(), &CipherSuite::from_id(0x002F).unwrap()).unwrap();
        assert!(matches!(cbc, RecordProtection::Block(_)));
        let gcm = RecordProtection::for_suite(ctx, &CipherSuite::from_id(0xC02F).unwrap()).unwrap();
        assert!(matches!(gcm, RecordProtection::Aead(_)));
    }

    #[test]
    fn tls13_suite_on_tls12_is_internal_error() {
        let result = RecordProtection::for_suite(legacy_ctx(ProtocolVersion::TLSV12), &CipherSuite::from_id(0x1301).unwrap());
        assert!(matches!(result, Err(RecordError::InternalError { .. })));
    }

    #[test]
    fn legacy_suite_on_tls13_is_internal_error() {
        let params = SecurityParameters::builder(ProtocolVersion::TLSV13)
            .prf_hash(HashAlgorithm::Sha256)
            .traffic_secrets(Secret::new(vec![1; 32]), Secret::new(vec![2; 32]))
            .build();
        let ctx = Arc::new(CryptoContext::new(ConnectionEnd::Client, params, Arc::new(OsNonceGenerator)));
        let result = RecordProtection::for_suite(ctx, &CipherSuite::from_id(0xC02F).unwrap());
        assert!(matches!(result, Err(RecordError::InternalError { .. })));
    }

    #[test]
    fn ssl3_uses_ssl_mac() {
        let protection =
            RecordProtection::for_suite(legacy_ctx(ProtocolVersion::SSLV3), &CipherSuite::from_id(0x002F).unwrap())
                .unwrap();
        assert!(format!("{protection:?}").contains("Ssl3"));
    }
}
