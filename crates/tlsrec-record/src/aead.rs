//! AEAD record protection (GCM, CCM, ChaCha20-Poly1305).
//!
//! ```text
//! <= TLS 1.2, GCM/CCM     explicit_nonce(8) || seal(payload) || tag
//! ChaCha20, any TLS 1.3   seal(payload [|| inner type]) || tag
//! ```
//!
//! The nonce mode is fixed at construction: RFC 5288 explicit nonces for
//! GCM and CCM before TLS 1.3, RFC 7905 implicit nonces for ChaCha20-Poly1305
//! and for every TLS 1.3 suite. Records carry an inner plaintext (payload
//! followed by the true content type) under TLS 1.3 or when a connection ID
//! is in use.

use std::sync::Arc;

use tlsrec_crypto::{
    AEAD_NONCE_LEN, AeadAlgorithm, AeadEngine, AeadFamily, CryptoError, key_schedule,
};
use tlsrec_proto::{ConnectionEnd, ContentType, ProtocolVersion};
use zeroize::Zeroize;

use crate::{
    additional_data,
    contract::{DecodedRecord, EncodedRecord, RecordCipher},
    error::RecordError,
    nonce::{self, EXPLICIT_FIXED_IV_LEN, EXPLICIT_NONCE_LEN, NonceMode},
    params::{CryptoContext, split_key_block},
};

/// AEAD record cipher for one connection.
pub struct AeadRecordCipher {
    ctx: Arc<CryptoContext>,
    algorithm: AeadAlgorithm,
    is_tls13: bool,
    nonce_mode: NonceMode,
    mac_size: usize,
    record_iv_size: usize,
    encrypt_iv: [u8; AEAD_NONCE_LEN],
    decrypt_iv: [u8; AEAD_NONCE_LEN],
    encrypt_connection_id: Vec<u8>,
    decrypt_connection_id: Vec<u8>,
    encrypt_use_inner_plaintext: bool,
    decrypt_use_inner_plaintext: bool,
    encryptor: AeadEngine,
    decryptor: AeadEngine,
}

impl AeadRecordCipher {
    /// Build both directions from the context's key material.
    ///
    /// TLS 1.3 derives keys from the traffic secrets, which must be present;
    /// earlier versions expand the master secret into a key block.
    pub fn new(ctx: Arc<CryptoContext>, algorithm: AeadAlgorithm) -> Result<Self, RecordError> {
        let version = ctx.version();
        let is_tls13 = version.is_tls13();
        let nonce_mode = if is_tls13 || algorithm.family() == AeadFamily::ChaCha20Poly1305 {
            NonceMode::Implicit
        } else {
            NonceMode::Explicit
        };

        let params = ctx.security_parameters();
        let encrypt_connection_id = params.connection_id_peer().to_vec();
        let decrypt_connection_id = params.connection_id_local().to_vec();

        let mut encrypt_iv = [0u8; AEAD_NONCE_LEN];
        let mut decrypt_iv = [0u8; AEAD_NONCE_LEN];
        let (encryptor, decryptor) = if is_tls13 {
            let encryptor = derive_tls13(&ctx, ctx.entity(), algorithm, &mut encrypt_iv)?;
            let decryptor = derive_tls13(&ctx, ctx.entity().peer(), algorithm, &mut decrypt_iv)?;
            (encryptor, decryptor)
        } else {
            let key_len = algorithm.key_len();
            let iv_len = nonce_mode.fixed_iv_len();
            let master = params
                .master_secret()
                .ok_or_else(|| RecordError::internal("AEAD cipher requires a master secret"))?;
            let key_block = key_schedule::calculate_key_block(
                params.prf_algorithm(),
                master,
                params.client_random(),
                params.server_random(),
                2 * key_len + 2 * iv_len,
            )?;
            let Some([client_key, server_key, client_iv, server_iv]) =
                split_key_block(&key_block, [key_len, key_len, iv_len, iv_len])
            else {
                return Err(RecordError::internal("key block too short"));
            };

            let (write_key, write_iv, read_key, read_iv) = if ctx.is_server() {
                (server_key, server_iv, client_key, client_iv)
            } else {
                (client_key, client_iv, server_key, server_iv)
            };
            encrypt_iv[..iv_len].copy_from_slice(write_iv);
            decrypt_iv[..iv_len].copy_from_slice(read_iv);
            (AeadEngine::new(algorithm, write_key)?, AeadEngine::new(algorithm, read_key)?)
        };

        tracing::debug!(
            ?algorithm,
            version = %version,
            ?nonce_mode,
            tag_size = algorithm.tag_len(),
            "AEAD record cipher initialized"
        );

        Ok(Self {
            algorithm,
            is_tls13,
            nonce_mode,
            mac_size: algorithm.tag_len(),
            record_iv_size: nonce_mode.record_iv_len(),
            encrypt_iv,
            decrypt_iv,
            encrypt_use_inner_plaintext: is_tls13 || !encrypt_connection_id.is_empty(),
            decrypt_use_inner_plaintext: is_tls13 || !decrypt_connection_id.is_empty(),
            encrypt_connection_id,
            decrypt_connection_id,
            encryptor,
            decryptor,
            ctx,
        })
    }

    /// Algorithm this cipher was built for.
    pub fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }

    /// Nonce construction in use.
    pub fn nonce_mode(&self) -> NonceMode {
        self.nonce_mode
    }

    fn encrypt_nonce(&self, seq_no: u64) -> [u8; AEAD_NONCE_LEN] {
        match self.nonce_mode {
            NonceMode::Explicit => nonce::explicit_nonce(&self.encrypt_iv, &seq_no.to_be_bytes()),
            NonceMode::Implicit => nonce::implicit_nonce(&self.encrypt_iv, seq_no),
        }
    }
}

/// Derive one direction's engine and write its IV into `iv` in place.
fn derive_tls13(
    ctx: &CryptoContext,
    end: ConnectionEnd,
    algorithm: AeadAlgorithm,
    iv: &mut [u8; AEAD_NONCE_LEN],
) -> Result<AeadEngine, RecordError> {
    let params = ctx.security_parameters();
    let hash = params.prf_hash();
    let prefix = ctx.version().hkdf_label_prefix();
    let keys = params
        .with_traffic_secret(end, |secret| {
            key_schedule::derive_traffic_keys(secret, hash, prefix, algorithm.key_len(), AEAD_NONCE_LEN)
        })
        .ok_or_else(|| RecordError::internal("TLS 1.3 cipher requires a traffic secret"))??;

    let engine = AeadEngine::new(algorithm, &keys.key)?;
    iv.copy_from_slice(&keys.iv);
    Ok(engine)
}

impl RecordCipher for AeadRecordCipher {
    fn ciphertext_decode_limit(&self, plaintext_limit: usize) -> usize {
        plaintext_limit
            + self.mac_size
            + self.record_iv_size
            + additional_data::inner_plaintext_decode_allowance(self.decrypt_use_inner_plaintext)
    }

    fn ciphertext_encode_limit(&self, plaintext_length: usize, plaintext_limit: usize) -> usize {
        let inner = plaintext_length.min(plaintext_limit) + usize::from(self.encrypt_use_inner_plaintext);
        inner + self.mac_size + self.record_iv_size
    }

    fn plaintext_decode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit
            .saturating_sub(self.mac_size + self.record_iv_size + usize::from(self.decrypt_use_inner_plaintext))
    }

    fn plaintext_encode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit
            .saturating_sub(self.mac_size + self.record_iv_size + usize::from(self.encrypt_use_inner_plaintext))
    }

    fn encode(
        &mut self,
        seq_no: u64,
        content_type: ContentType,
        record_version: ProtocolVersion,
        header_allocation: usize,
        plaintext: &[u8],
    ) -> Result<EncodedRecord, RecordError> {
        let nonce = self.encrypt_nonce(seq_no);

        let inner_len = plaintext.len() + usize::from(self.encrypt_use_inner_plaintext);
        let ciphertext_len = self.encryptor.output_size(true, inner_len);
        // The additional data commits to this length before the engine runs
        if ciphertext_len != inner_len + self.mac_size {
            return Err(RecordError::internal("AEAD output size mispredicted"));
        }

        let total = self.record_iv_size + ciphertext_len;
        let mut buf = vec![0u8; header_allocation + total];
        let mut off = header_allocation;

        if self.record_iv_size != 0 {
            buf[off..off + EXPLICIT_NONCE_LEN].copy_from_slice(&nonce[EXPLICIT_FIXED_IV_LEN..]);
            off += self.record_iv_size;
        }

        let record_type =
            additional_data::outer_record_type(self.is_tls13, &self.encrypt_connection_id, content_type);

        buf[off..off + plaintext.len()].copy_from_slice(plaintext);
        if self.encrypt_use_inner_plaintext {
            buf[off + plaintext.len()] = content_type.to_u8();
        }

        let aad = additional_data::for_aead(
            self.is_tls13,
            seq_no,
            record_type,
            record_version,
            &self.encrypt_connection_id,
            ciphertext_len,
            inner_len,
        );
        self.encryptor.seal(&nonce, &aad, &mut buf[off..off + ciphertext_len])?;

        Ok(EncodedRecord { buf, offset: header_allocation, len: total, record_type })
    }

    fn decode<'a>(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        record_version: ProtocolVersion,
        ciphertext: &'a mut [u8],
    ) -> Result<DecodedRecord<'a>, RecordError> {
        if ciphertext.len() < self.record_iv_size + self.mac_size {
            return Err(RecordError::DecodeError { reason: "record shorter than nonce and tag" });
        }

        let nonce = match self.nonce_mode {
            NonceMode::Explicit => {
                let mut explicit = [0u8; EXPLICIT_NONCE_LEN];
                explicit.copy_from_slice(&ciphertext[..EXPLICIT_NONCE_LEN]);
                nonce::explicit_nonce(&self.decrypt_iv, &explicit)
            },
            NonceMode::Implicit => nonce::implicit_nonce(&self.decrypt_iv, seq_no),
        };

        let start = self.record_iv_size;
        let ciphertext_len = ciphertext.len() - start;
        let plaintext_len = self.decryptor.output_size(false, ciphertext_len);

        let aad = additional_data::for_aead(
            self.is_tls13,
            seq_no,
            record_type,
            record_version,
            &self.decrypt_connection_id,
            ciphertext_len,
            plaintext_len,
        );

        let opened = match self.decryptor.open(&nonce, &aad, &mut ciphertext[start..]) {
            Ok(len) => len,
            Err(CryptoError::AuthenticationFailed) => {
                tracing::trace!(seq_no, "AEAD record failed authentication");
                return Err(RecordError::BadRecordMac);
            },
            Err(e) => return Err(e.into()),
        };
        if opened != plaintext_len {
            return Err(RecordError::internal("AEAD plaintext length mispredicted"));
        }

        let (len, content_type) = if self.decrypt_use_inner_plaintext {
            additional_data::strip_inner_plaintext(&ciphertext[start..start + plaintext_len])?
        } else {
            (plaintext_len, record_type)
        };

        Ok(DecodedRecord { plaintext: &ciphertext[start..start + len], content_type })
    }

    fn rekey_encoder(&mut self) -> Result<(), RecordError> {
        if !self.is_tls13 {
            return Err(RecordError::internal("rekey requires TLS 1.3"));
        }
        self.encryptor = derive_tls13(&self.ctx, self.ctx.entity(), self.algorithm, &mut self.encrypt_iv)?;
        tracing::debug!(algorithm = ?self.algorithm, "AEAD encoder rekeyed");
        Ok(())
    }

    fn rekey_decoder(&mut self) -> Result<(), RecordError> {
        if !self.is_tls13 {
            return Err(RecordError::internal("rekey requires TLS 1.3"));
        }
        self.decryptor = derive_tls13(&self.ctx, self.ctx.entity().peer(), self.algorithm, &mut self.decrypt_iv)?;
        tracing::debug!(algorithm = ?self.algorithm, "AEAD decoder rekeyed");
        Ok(())
    }

    fn uses_opaque_record_type(&self) -> bool {
        self.is_tls13 || !self.decrypt_connection_id.is_empty()
    }
}

impl Drop for AeadRecordCipher {
    fn drop(&mut self) {
        self.encrypt_iv.zeroize();
        self.decrypt_iv.zeroize();
    }
}

impl std::fmt::Debug for AeadRecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadRecordCipher")
            .field("algorithm", &self.algorithm)
            .field("is_tls13", &self.is_tls13)
            .field("nonce_mode", &self.nonce_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tlsrec_crypto::{HashAlgorithm, OsNonceGenerator, Secret};

    use super::*;
    use crate::params::SecurityParameters;

    fn legacy_pair(algorithm: AeadAlgorithm, version: ProtocolVersion) -> (AeadRecordCipher, AeadRecordCipher) {
        let make = |end| {
            let params = SecurityParameters::builder(version)
                .master_secret(Secret::new(vec![0x33; 48]), [1; 32], [2; 32])
                .build();
            let ctx = Arc::new(CryptoContext::new(end, params, Arc::new(OsNonceGenerator)));
            AeadRecordCipher::new(ctx, algorithm).unwrap()
        };
        (make(ConnectionEnd::Client), make(ConnectionEnd::Server))
    }

    fn tls13_pair(algorithm: AeadAlgorithm) -> (AeadRecordCipher, AeadRecordCipher) {
        let make = |end| {
            let params = SecurityParameters::builder(ProtocolVersion::TLSV13)
                .prf_hash(HashAlgorithm::Sha256)
                .traffic_secrets(Secret::new(vec![0xc1; 32]), Secret::new(vec![0x5e; 32]))
                .build();
            let ctx = Arc::new(CryptoContext::new(end, params, Arc::new(OsNonceGenerator)));
            AeadRecordCipher::new(ctx, algorithm).unwrap()
        };
        (make(ConnectionEnd::Client), make(ConnectionEnd::Server))
    }

    #[test]
    fn nonce_mode_selection() {
        let (gcm, _) = legacy_pair(AeadAlgorithm::Aes128Gcm, ProtocolVersion::TLSV12);
        assert_eq!(gcm.nonce_mode(), NonceMode::Explicit);
        let (chacha, _) = legacy_pair(AeadAlgorithm::ChaCha20Poly1305, ProtocolVersion::TLSV12);
        assert_eq!(chacha.nonce_mode(), NonceMode::Implicit);
        let (tls13, _) = tls13_pair(AeadAlgorithm::Aes128Gcm);
        assert_eq!(tls13.nonce_mode(), NonceMode::Implicit);
    }

    #[test]
    fn explicit_nonce_is_sequence_number() {
        let (mut client, _) = legacy_pair(AeadAlgorithm::Aes256Gcm, ProtocolVersion::TLSV12);
        let rec = client.encode(0x0102_0304, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, 0, b"x").unwrap();
        assert_eq!(&rec.fragment()[..8], &0x0102_0304u64.to_be_bytes());
    }

    #[test]
    fn tls13_hides_content_type() {
        let (mut client, mut server) = tls13_pair(AeadAlgorithm::ChaCha20Poly1305);
        let mut rec = client.encode(0, ContentType::HANDSHAKE, ProtocolVersion::TLSV12, 5, b"finished").unwrap();
        assert_eq!(rec.record_type, ContentType::APPLICATION_DATA);
        assert_eq!(rec.len, 8 + 1 + 16);

        let (offset, len) = (rec.offset, rec.len);
        let decoded = server
            .decode(0, rec.record_type, ProtocolVersion::TLSV12, &mut rec.buf[offset..offset + len])
            .unwrap();
        assert_eq!(decoded.plaintext, b"finished");
        assert_eq!(decoded.content_type, ContentType::HANDSHAKE);
    }

    #[test]
    fn fully_padded_inner_plaintext_fits_decode_limit() {
        let (client, mut server) = tls13_pair(AeadAlgorithm::Aes128Gcm);

        // payload || type || 255 zero bytes || room for the tag
        let mut record = vec![0x61; 1 << 14];
        record.push(ContentType::HANDSHAKE.to_u8());
        record.resize(record.len() + 255 + client.mac_size, 0);
        let aad = additional_data::tls13(ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, record.len());
        client.encryptor.seal(&client.encrypt_nonce(0), &aad, &mut record).unwrap();

        assert_eq!(record.len(), server.ciphertext_decode_limit(1 << 14));
        let decoded = server.decode(0, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, &mut record).unwrap();
        assert_eq!(decoded.plaintext.len(), 1 << 14);
        assert_eq!(decoded.content_type, ContentType::HANDSHAKE);
    }

    #[test]
    fn decode_rejects_short_record() {
        let (_, mut server) = legacy_pair(AeadAlgorithm::Aes128Ccm8, ProtocolVersion::TLSV12);
        let mut short = [0u8; 15];
        assert!(matches!(
            server.decode(0, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, &mut short),
            Err(RecordError::DecodeError { .. })
        ));
    }

    #[test]
    fn wrong_sequence_number_fails_authentication() {
        let (mut client, mut server) = legacy_pair(AeadAlgorithm::ChaCha20Poly1305, ProtocolVersion::TLSV12);
        let mut rec = client.encode(7, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, 0, b"data").unwrap();
        assert_eq!(
            server.decode(8, rec.record_type, ProtocolVersion::TLSV12, &mut rec.buf),
            Err(RecordError::BadRecordMac)
        );
    }

    #[test]
    fn rekey_rejected_before_tls13() {
        let (mut client, _) = legacy_pair(AeadAlgorithm::Aes128Gcm, ProtocolVersion::TLSV12);
        assert!(matches!(client.rekey_encoder(), Err(RecordError::InternalError { .. })));
        assert!(matches!(client.rekey_decoder(), Err(RecordError::InternalError { .. })));
    }

    #[test]
    fn tls13_without_traffic_secret_is_internal_error() {
        let params = SecurityParameters::builder(ProtocolVersion::TLSV13).build();
        let ctx = Arc::new(CryptoContext::new(ConnectionEnd::Client, params, Arc::new(OsNonceGenerator)));
        assert!(matches!(
            AeadRecordCipher::new(ctx, AeadAlgorithm::Aes128Gcm),
            Err(RecordError::InternalError { .. })
        ));
    }

    #[test]
    fn opaque_record_type() {
        let (legacy, _) = legacy_pair(AeadAlgorithm::Aes128Gcm, ProtocolVersion::TLSV12);
        assert!(!legacy.uses_opaque_record_type());
        let (tls13, _) = tls13_pair(AeadAlgorithm::Aes128Gcm);
        assert!(tls13.uses_opaque_record_type());
    }
}
