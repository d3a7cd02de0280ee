//! CBC + HMAC record protection.
//!
//! ```text
//! MAC-then-encrypt   [explicit IV] || CBC(payload || mac || padding)
//! Encrypt-then-MAC   [explicit IV] || CBC(payload || padding) || mac
//! ```
//!
//! TLS 1.0 and SSLv3 chain the IV from the previous record; TLS 1.1+ and every
//! DTLS version prepend a random block that is encrypted with the record.
//!
//! # Security
//!
//! MAC-then-encrypt decoding is hardened against Lucky13:
//!
//! - The padding check always performs 256 comparisons, finishing the scan
//!   over a per-instance random buffer when the real padding is shorter
//! - An invalid padding yields length 0 instead of an early return
//! - The MAC is computed with [`SuiteMac::calculate_mac_constant_time`] so
//!   the compression-function count does not depend on the padding length
//! - Padding and MAC failures both surface as [`RecordError::BadRecordMac`]

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tlsrec_crypto::{BlockAlgorithm, CbcCipher, MacAlgorithm, TlsHmac, key_schedule};
use tlsrec_proto::{ContentType, ProtocolVersion};
use zeroize::Zeroizing;

use crate::{
    additional_data,
    contract::{DecodedRecord, EncodedRecord, RecordCipher},
    error::RecordError,
    params::{CryptoContext, split_key_block},
    suite_mac::SuiteMac,
};

/// Size of the dummy buffer and the fixed padding scan length.
pub const MAX_PADDING: usize = 256;

/// CBC record cipher for one connection.
#[allow(clippy::struct_excessive_bools, reason = "negotiated flags fixed at construction")]
pub struct BlockRecordCipher {
    ctx: Arc<CryptoContext>,
    random_data: Zeroizing<Vec<u8>>,
    encrypt_then_mac: bool,
    use_explicit_iv: bool,
    accept_extra_padding: bool,
    use_extra_padding: bool,
    encrypt_connection_id: Vec<u8>,
    decrypt_connection_id: Vec<u8>,
    encrypt_use_inner_plaintext: bool,
    decrypt_use_inner_plaintext: bool,
    encrypt_cipher: CbcCipher,
    decrypt_cipher: CbcCipher,
    write_mac: SuiteMac,
    read_mac: SuiteMac,
}

impl BlockRecordCipher {
    /// Build both directions from the key block.
    ///
    /// Fails with `InternalError` for TLS 1.3, which has no CBC suites.
    pub fn new(
        ctx: Arc<CryptoContext>,
        algorithm: BlockAlgorithm,
        mac_algorithm: MacAlgorithm,
    ) -> Result<Self, RecordError> {
        let version = ctx.version();
        if version.is_tls13() {
            return Err(RecordError::internal("CBC cipher suites cannot be used with TLS 1.3"));
        }
        let params = ctx.security_parameters();

        let random_data = Zeroizing::new(ctx.nonce_generator().generate_nonce(MAX_PADDING)?);

        let encrypt_then_mac = params.encrypt_then_mac();
        let use_explicit_iv = version.uses_explicit_iv();
        let accept_extra_padding = !version.is_ssl();
        // Extra padding is never sent over DTLS, only accepted
        let use_extra_padding = params.extended_padding()
            && !version.is_ssl()
            && !version.is_dtls()
            && (encrypt_then_mac || !params.truncated_hmac());

        let encrypt_connection_id = params.connection_id_peer().to_vec();
        let decrypt_connection_id = params.connection_id_local().to_vec();

        let mac_len = mac_algorithm.output_len();
        let key_len = algorithm.key_len();
        let block_size = algorithm.block_len();
        let iv_len = if use_explicit_iv { 0 } else { block_size };

        let master = params
            .master_secret()
            .ok_or_else(|| RecordError::internal("CBC cipher requires a master secret"))?;
        let key_block = key_schedule::calculate_key_block(
            params.prf_algorithm(),
            master,
            params.client_random(),
            params.server_random(),
            2 * mac_len + 2 * key_len + 2 * iv_len,
        )?;
        let Some([client_mac, server_mac, client_key, server_key, client_iv, server_iv]) =
            split_key_block(&key_block, [mac_len, mac_len, key_len, key_len, iv_len, iv_len])
        else {
            return Err(RecordError::internal("key block too short"));
        };

        // With explicit IVs the chain starts at zero and the random first
        // block of each record acts as its IV
        let zero_iv = [0u8; tlsrec_crypto::AES_BLOCK_SIZE];
        let (client_iv, server_iv) =
            if use_explicit_iv { (&zero_iv[..], &zero_iv[..]) } else { (client_iv, server_iv) };

        let (write_mac, write_key, write_iv, read_mac, read_key, read_iv) = if ctx.is_server() {
            (server_mac, server_key, server_iv, client_mac, client_key, client_iv)
        } else {
            (client_mac, client_key, client_iv, server_mac, server_key, server_iv)
        };

        let write_mac = SuiteMac::new(&ctx, TlsHmac::new(mac_algorithm, write_mac)?);
        let read_mac = SuiteMac::new(&ctx, TlsHmac::new(mac_algorithm, read_mac)?);
        let encrypt_cipher = CbcCipher::new(algorithm, write_key, write_iv)?;
        let decrypt_cipher = CbcCipher::new(algorithm, read_key, read_iv)?;

        tracing::debug!(
            ?algorithm,
            ?mac_algorithm,
            version = %version,
            encrypt_then_mac,
            use_explicit_iv,
            use_extra_padding,
            mac_size = write_mac.size(),
            "CBC record cipher initialized"
        );

        Ok(Self {
            random_data,
            encrypt_then_mac,
            use_explicit_iv,
            accept_extra_padding,
            use_extra_padding,
            encrypt_use_inner_plaintext: !encrypt_connection_id.is_empty(),
            decrypt_use_inner_plaintext: !decrypt_connection_id.is_empty(),
            encrypt_connection_id,
            decrypt_connection_id,
            encrypt_cipher,
            decrypt_cipher,
            write_mac,
            read_mac,
            ctx,
        })
    }

    fn block_size(&self) -> usize {
        self.encrypt_cipher.block_size()
    }

    /// `min(trailing_zeros(random u32), max)`: each extra block is half as
    /// likely as the one before.
    fn choose_extra_pad_blocks(&self, max: usize) -> Result<usize, RecordError> {
        let x = self.ctx.nonce_generator().next_u32()?;
        Ok((x.trailing_zeros() as usize).min(max))
    }

    fn ciphertext_length(&self, mac_size: usize, max_padding: usize, plaintext_length: usize) -> usize {
        let block_size = self.block_size();
        let mut len = plaintext_length + max_padding;
        if self.encrypt_then_mac {
            len -= len % block_size;
            len += mac_size;
        } else {
            len += mac_size;
            len -= len % block_size;
        }
        if self.use_explicit_iv {
            len += block_size;
        }
        len
    }

    fn plaintext_limit(&self, ciphertext_limit: usize) -> usize {
        let block_size = self.decrypt_cipher.block_size();
        let mac_size = self.read_mac.size();

        let mut limit = ciphertext_limit;
        if self.use_explicit_iv {
            limit = limit.saturating_sub(block_size);
        }
        if self.encrypt_then_mac {
            limit = limit.saturating_sub(mac_size);
            limit -= limit % block_size;
        } else {
            limit -= limit % block_size;
            limit = limit.saturating_sub(mac_size);
        }
        // At least one padding byte
        limit.saturating_sub(1)
    }
}

/// Outcome of [`check_padding_constant_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PaddingCheck {
    /// Total padding length including the length byte; 0 when invalid
    pub(crate) total_pad: usize,
    /// Byte comparisons performed, always [`MAX_PADDING`]
    pub(crate) comparisons: usize,
}

/// Validate TLS padding at the end of `buf` without data-dependent branching
/// on the padding contents.
///
/// The scan covers the claimed padding, then continues over `random_data`
/// until [`MAX_PADDING`] bytes have been compared in total. The accumulated
/// difference is folded into `random_data[0]` so the dummy loop has an
/// observable effect.
pub(crate) fn check_padding_constant_time(
    buf: &[u8],
    mac_size: usize,
    block_size: usize,
    accept_extra_padding: bool,
    random_data: &mut [u8],
) -> PaddingCheck {
    let end = buf.len();
    let last_byte = buf[end - 1];
    let mut total_pad = usize::from(last_byte) + 1;

    let mut dummy_index = 0;
    let mut comparisons = 0;
    let mut pad_diff = 0u8;

    let max_pad = if accept_extra_padding { MAX_PADDING } else { block_size };
    let total_pad_limit = max_pad.min(end.saturating_sub(mac_size));

    if total_pad > total_pad_limit {
        total_pad = 0;
    } else {
        for &b in &buf[end - total_pad..] {
            pad_diff |= b ^ last_byte;
            comparisons += 1;
        }
        dummy_index = total_pad;
        if pad_diff != 0 {
            total_pad = 0;
        }
    }

    while dummy_index < MAX_PADDING {
        pad_diff |= random_data[dummy_index] ^ last_byte;
        dummy_index += 1;
        comparisons += 1;
    }
    random_data[0] ^= pad_diff;

    PaddingCheck { total_pad, comparisons }
}

impl RecordCipher for BlockRecordCipher {
    fn ciphertext_decode_limit(&self, plaintext_limit: usize) -> usize {
        let inner =
            plaintext_limit + additional_data::inner_plaintext_decode_allowance(self.decrypt_use_inner_plaintext);
        self.ciphertext_length(self.read_mac.size(), MAX_PADDING, inner)
    }

    fn ciphertext_encode_limit(&self, plaintext_length: usize, plaintext_limit: usize) -> usize {
        let inner = plaintext_length.min(plaintext_limit) + usize::from(self.encrypt_use_inner_plaintext);
        let max_padding = if self.use_extra_padding { MAX_PADDING } else { self.block_size() };
        self.ciphertext_length(self.write_mac.size(), max_padding, inner)
    }

    fn plaintext_decode_limit(&self, ciphertext_limit: usize) -> usize {
        self.plaintext_limit(ciphertext_limit).saturating_sub(usize::from(self.decrypt_use_inner_plaintext))
    }

    fn plaintext_encode_limit(&self, ciphertext_limit: usize) -> usize {
        self.plaintext_limit(ciphertext_limit).saturating_sub(usize::from(self.encrypt_use_inner_plaintext))
    }

    fn encode(
        &mut self,
        seq_no: u64,
        content_type: ContentType,
        _record_version: ProtocolVersion,
        header_allocation: usize,
        plaintext: &[u8],
    ) -> Result<EncodedRecord, RecordError> {
        let block_size = self.block_size();
        let mac_size = self.write_mac.size();
        let inner_len = plaintext.len() + usize::from(self.encrypt_use_inner_plaintext);

        let mut enc_input_len = inner_len;
        if !self.encrypt_then_mac {
            enc_input_len += mac_size;
        }

        let mut padding_length = block_size - enc_input_len % block_size;
        if self.use_extra_padding {
            let max_extra_pad_blocks = (MAX_PADDING - padding_length) / block_size;
            padding_length += self.choose_extra_pad_blocks(max_extra_pad_blocks)? * block_size;
        }

        let iv_len = if self.use_explicit_iv { block_size } else { 0 };
        let mut total = iv_len + enc_input_len + padding_length;
        if self.encrypt_then_mac {
            total += mac_size;
        }

        let mut buf = vec![0u8; header_allocation + total];
        let mut off = header_allocation;

        if self.use_explicit_iv {
            self.ctx.nonce_generator().fill_bytes(&mut buf[off..off + block_size])?;
            off += block_size;
        }

        let record_type = additional_data::outer_record_type(false, &self.encrypt_connection_id, content_type);

        let payload_start = off;
        buf[off..off + plaintext.len()].copy_from_slice(plaintext);
        off += plaintext.len();
        if self.encrypt_use_inner_plaintext {
            buf[off] = content_type.to_u8();
            off += 1;
        }

        if !self.encrypt_then_mac {
            let mac = self.write_mac.calculate_mac(
                seq_no,
                record_type,
                &self.encrypt_connection_id,
                &buf[payload_start..off],
            );
            buf[off..off + mac.len()].copy_from_slice(&mac);
            off += mac.len();
        }

        let pad_byte = (padding_length - 1) as u8;
        buf[off..off + padding_length].fill(pad_byte);
        off += padding_length;

        self.encrypt_cipher.encrypt_in_place(&mut buf[header_allocation..off])?;

        if self.encrypt_then_mac {
            let mac = self.write_mac.calculate_mac(
                seq_no,
                record_type,
                &self.encrypt_connection_id,
                &buf[header_allocation..off],
            );
            buf[off..off + mac.len()].copy_from_slice(&mac);
            off += mac.len();
        }

        if off != header_allocation + total {
            return Err(RecordError::internal("CBC record length mispredicted"));
        }

        Ok(EncodedRecord { buf, offset: header_allocation, len: total, record_type })
    }

    fn decode<'a>(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        _record_version: ProtocolVersion,
        ciphertext: &'a mut [u8],
    ) -> Result<DecodedRecord<'a>, RecordError> {
        let block_size = self.decrypt_cipher.block_size();
        let mac_size = self.read_mac.size();
        let len = ciphertext.len();

        let mut min_len =
            if self.encrypt_then_mac { block_size + mac_size } else { block_size.max(mac_size + 1) };
        if self.use_explicit_iv {
            min_len += block_size;
        }
        if len < min_len {
            return Err(RecordError::DecodeError { reason: "CBC record too short" });
        }

        let mut blocks_len = len;
        if self.encrypt_then_mac {
            blocks_len -= mac_size;
        }
        if blocks_len % block_size != 0 {
            return Err(RecordError::DecodeError { reason: "CBC record is not block aligned" });
        }

        if self.encrypt_then_mac {
            let expected = self.read_mac.calculate_mac(
                seq_no,
                record_type,
                &self.decrypt_connection_id,
                &ciphertext[..blocks_len],
            );
            let received = &ciphertext[blocks_len..blocks_len + mac_size];
            if !bool::from(expected.ct_eq(received)) {
                tracing::trace!(seq_no, "CBC record failed encrypt-then-MAC check");
                return Err(RecordError::BadRecordMac);
            }
        }

        self.decrypt_cipher.decrypt_in_place(&mut ciphertext[..blocks_len])?;

        let mut start = 0;
        if self.use_explicit_iv {
            start = block_size;
            blocks_len -= block_size;
        }

        let padding = check_padding_constant_time(
            &ciphertext[start..start + blocks_len],
            if self.encrypt_then_mac { 0 } else { mac_size },
            block_size,
            self.accept_extra_padding,
            &mut self.random_data,
        );
        let mut bad_mac = padding.total_pad == 0;

        let mut dec_len = blocks_len - padding.total_pad;

        if !self.encrypt_then_mac {
            dec_len -= mac_size;
            let expected = self.read_mac.calculate_mac_constant_time(
                seq_no,
                record_type,
                &self.decrypt_connection_id,
                &ciphertext[start..start + dec_len],
                blocks_len - mac_size,
                &self.random_data,
            );
            let received = &ciphertext[start + dec_len..start + dec_len + mac_size];
            bad_mac |= !bool::from(expected.ct_eq(received));
        }

        if bad_mac {
            tracing::trace!(seq_no, "CBC record failed padding or MAC check");
            return Err(RecordError::BadRecordMac);
        }

        let (len, content_type) = if self.decrypt_use_inner_plaintext {
            additional_data::strip_inner_plaintext(&ciphertext[start..start + dec_len])?
        } else {
            (dec_len, record_type)
        };

        Ok(DecodedRecord { plaintext: &ciphertext[start..start + len], content_type })
    }

    fn uses_opaque_record_type(&self) -> bool {
        !self.decrypt_connection_id.is_empty()
    }
}

impl std::fmt::Debug for BlockRecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRecordCipher")
            .field("cipher", &self.encrypt_cipher)
            .field("mac", &self.write_mac)
            .field("encrypt_then_mac", &self.encrypt_then_mac)
            .field("use_explicit_iv", &self.use_explicit_iv)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tlsrec_crypto::{HashAlgorithm, OsNonceGenerator, Secret};
    use tlsrec_proto::ConnectionEnd;

    use super::*;
    use crate::params::SecurityParameters;

    fn padded(payload_len: usize, pad_len: usize) -> Vec<u8> {
        let mut buf = vec![0xaa; payload_len];
        buf.extend(std::iter::repeat_n((pad_len - 1) as u8, pad_len));
        buf
    }

    #[test]
    fn valid_padding_is_found() {
        let mut random = [0u8; MAX_PADDING];
        let buf = padded(27, 5);
        let check = check_padding_constant_time(&buf, 20, 16, true, &mut random);
        assert_eq!(check.total_pad, 5);
    }

    #[test]
    fn corrupt_padding_yields_zero() {
        let mut random = [0u8; MAX_PADDING];
        let mut buf = padded(27, 5);
        buf[28] ^= 1;
        let check = check_padding_constant_time(&buf, 20, 16, true, &mut random);
        assert_eq!(check.total_pad, 0);
    }

    #[test]
    fn padding_longer_than_record_yields_zero() {
        let mut random = [0u8; MAX_PADDING];
        let mut buf = vec![0u8; 32];
        buf[31] = 200;
        let check = check_padding_constant_time(&buf, 20, 16, true, &mut random);
        assert_eq!(check.total_pad, 0);
    }

    #[test]
    fn ssl_rejects_padding_longer_than_a_block() {
        let mut random = [0u8; MAX_PADDING];
        let buf = padded(40, 24);
        assert_eq!(check_padding_constant_time(&buf, 20, 16, false, &mut random).total_pad, 0);
        assert_eq!(check_padding_constant_time(&buf, 20, 16, true, &mut random).total_pad, 24);
    }

    fn pair(version: ProtocolVersion, etm: bool) -> (BlockRecordCipher, BlockRecordCipher) {
        let make = |end| {
            let params = SecurityParameters::builder(version)
                .master_secret(Secret::new(vec![0x44; 48]), [3; 32], [4; 32])
                .encrypt_then_mac(etm)
                .build();
            let ctx = Arc::new(CryptoContext::new(end, params, Arc::new(OsNonceGenerator)));
            BlockRecordCipher::new(ctx, BlockAlgorithm::Aes128, MacAlgorithm::Hmac(HashAlgorithm::Sha1)).unwrap()
        };
        (make(ConnectionEnd::Client), make(ConnectionEnd::Server))
    }

    #[test]
    fn tls13_is_rejected() {
        let params = SecurityParameters::builder(ProtocolVersion::TLSV13).build();
        let ctx = Arc::new(CryptoContext::new(ConnectionEnd::Client, params, Arc::new(OsNonceGenerator)));
        assert!(matches!(
            BlockRecordCipher::new(ctx, BlockAlgorithm::Aes128, MacAlgorithm::Hmac(HashAlgorithm::Sha256)),
            Err(RecordError::InternalError { .. })
        ));
    }

    #[test]
    fn mac_then_encrypt_record_is_block_aligned() {
        let (mut client, mut server) = pair(ProtocolVersion::TLSV12, false);
        let mut rec = client.encode(0, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, 0, b"hello").unwrap();
        // IV block + roundup(5 + 20 + 1)
        assert_eq!(rec.len, 16 + 32);

        let decoded = server.decode(0, rec.record_type, ProtocolVersion::TLSV12, &mut rec.buf).unwrap();
        assert_eq!(decoded.plaintext, b"hello");
    }

    #[test]
    fn encrypt_then_mac_appends_tag_after_blocks() {
        let (mut client, mut server) = pair(ProtocolVersion::TLSV12, true);
        let mut rec = client.encode(1, ContentType::HANDSHAKE, ProtocolVersion::TLSV12, 0, b"hello").unwrap();
        assert_eq!(rec.len, 16 + 16 + 20);

        let decoded = server.decode(1, rec.record_type, ProtocolVersion::TLSV12, &mut rec.buf).unwrap();
        assert_eq!(decoded.plaintext, b"hello");
        assert_eq!(decoded.content_type, ContentType::HANDSHAKE);
    }

    #[test]
    fn extended_padding_is_tls_only() {
        let limit = |version| {
            let params = SecurityParameters::builder(version)
                .master_secret(Secret::new(vec![0x44; 48]), [3; 32], [4; 32])
                .encrypt_then_mac(true)
                .extended_padding(true)
                .build();
            let ctx = Arc::new(CryptoContext::new(ConnectionEnd::Client, params, Arc::new(OsNonceGenerator)));
            let cipher =
                BlockRecordCipher::new(ctx, BlockAlgorithm::Aes128, MacAlgorithm::Hmac(HashAlgorithm::Sha1)).unwrap();
            cipher.ciphertext_encode_limit(10, 1 << 14)
        };
        // IV block + padded blocks + MAC
        assert_eq!(limit(ProtocolVersion::TLSV12), 16 + 256 + 20);
        assert_eq!(limit(ProtocolVersion::DTLSV12), 16 + 16 + 20);
        assert_eq!(limit(ProtocolVersion::DTLSV10), 16 + 16 + 20);
    }

    #[test]
    fn misaligned_record_is_decode_error() {
        let (_, mut server) = pair(ProtocolVersion::TLSV12, false);
        let mut buf = [0u8; 40];
        assert!(matches!(
            server.decode(0, ContentType::APPLICATION_DATA, ProtocolVersion::TLSV12, &mut buf),
            Err(RecordError::DecodeError { .. })
        ));
    }

    proptest! {
        #[test]
        fn padding_check_comparison_count_is_fixed(
            buf in proptest::collection::vec(any::<u8>(), 32..512),
            mac_size in 0usize..=48,
            accept_extra in any::<bool>(),
        ) {
            let mut random = [0x11u8; MAX_PADDING];
            let check = check_padding_constant_time(&buf, mac_size, 16, accept_extra, &mut random);
            // PROPERTY: the scan length never depends on the input
            prop_assert_eq!(check.comparisons, MAX_PADDING);
        }
    }
}
