//! Authentication without encryption: `payload || mac`.
//!
//! [`NullRecordCipher::passthrough`] covers `TLS_NULL_WITH_NULL_NULL`, the
//! state before the first handshake completes, where records pass unchanged.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tlsrec_crypto::{MacAlgorithm, TlsHmac, key_schedule};
use tlsrec_proto::{ContentType, ProtocolVersion};

use crate::{
    additional_data,
    contract::{DecodedRecord, EncodedRecord, RecordCipher},
    error::RecordError,
    params::{CryptoContext, split_key_block},
    suite_mac::SuiteMac,
};

struct NullMacs {
    ctx: Arc<CryptoContext>,
    write_mac: SuiteMac,
    read_mac: SuiteMac,
}

/// Null-encryption record cipher, optionally with a MAC.
pub struct NullRecordCipher {
    macs: Option<NullMacs>,
    encrypt_connection_id: Vec<u8>,
    decrypt_connection_id: Vec<u8>,
}

impl NullRecordCipher {
    /// MAC-only protection keyed from the key block.
    pub fn new(ctx: Arc<CryptoContext>, mac_algorithm: MacAlgorithm) -> Result<Self, RecordError> {
        let version = ctx.version();
        if version.is_tls13() {
            return Err(RecordError::internal("NULL cipher suites cannot be used with TLS 1.3"));
        }
        let params = ctx.security_parameters();
        let mac_len = mac_algorithm.output_len();

        let master = params
            .master_secret()
            .ok_or_else(|| RecordError::internal("NULL cipher requires a master secret"))?;
        let key_block = key_schedule::calculate_key_block(
            params.prf_algorithm(),
            master,
            params.client_random(),
            params.server_random(),
            2 * mac_len,
        )?;
        let Some([client_mac, server_mac]) = split_key_block(&key_block, [mac_len, mac_len]) else {
            return Err(RecordError::internal("key block too short"));
        };
        let (write_mac, read_mac) =
            if ctx.is_server() { (server_mac, client_mac) } else { (client_mac, server_mac) };

        let write_mac = SuiteMac::new(&ctx, TlsHmac::new(mac_algorithm, write_mac)?);
        let read_mac = SuiteMac::new(&ctx, TlsHmac::new(mac_algorithm, read_mac)?);

        tracing::debug!(?mac_algorithm, version = %version, mac_size = write_mac.size(), "NULL record cipher initialized");

        Ok(Self {
            encrypt_connection_id: params.connection_id_peer().to_vec(),
            decrypt_connection_id: params.connection_id_local().to_vec(),
            macs: Some(NullMacs { ctx, write_mac, read_mac }),
        })
    }

    /// No MAC, no encryption. Records are copied through unchanged.
    pub fn passthrough() -> Self {
        Self { macs: None, encrypt_connection_id: Vec::new(), decrypt_connection_id: Vec::new() }
    }

    fn use_inner_plaintext(connection_id: &[u8]) -> usize {
        usize::from(!connection_id.is_empty())
    }

    fn write_mac_size(&self) -> usize {
        self.macs.as_ref().map_or(0, |m| m.write_mac.size())
    }

    fn read_mac_size(&self) -> usize {
        self.macs.as_ref().map_or(0, |m| m.read_mac.size())
    }
}

impl RecordCipher for NullRecordCipher {
    fn ciphertext_decode_limit(&self, plaintext_limit: usize) -> usize {
        plaintext_limit
            + additional_data::inner_plaintext_decode_allowance(!self.decrypt_connection_id.is_empty())
            + self.read_mac_size()
    }

    fn ciphertext_encode_limit(&self, plaintext_length: usize, plaintext_limit: usize) -> usize {
        plaintext_length.min(plaintext_limit)
            + Self::use_inner_plaintext(&self.encrypt_connection_id)
            + self.write_mac_size()
    }

    fn plaintext_decode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit
            .saturating_sub(self.read_mac_size() + Self::use_inner_plaintext(&self.decrypt_connection_id))
    }

    fn plaintext_encode_limit(&self, ciphertext_limit: usize) -> usize {
        ciphertext_limit
            .saturating_sub(self.write_mac_size() + Self::use_inner_plaintext(&self.encrypt_connection_id))
    }

    fn encode(
        &mut self,
        seq_no: u64,
        content_type: ContentType,
        _record_version: ProtocolVersion,
        header_allocation: usize,
        plaintext: &[u8],
    ) -> Result<EncodedRecord, RecordError> {
        let Some(macs) = self.macs.as_mut() else {
            let mut buf = vec![0u8; header_allocation + plaintext.len()];
            buf[header_allocation..].copy_from_slice(plaintext);
            return Ok(EncodedRecord { buf, offset: header_allocation, len: plaintext.len(), record_type: content_type });
        };

        let use_inner = !self.encrypt_connection_id.is_empty();
        let inner_len = plaintext.len() + usize::from(use_inner);
        let total = inner_len + macs.write_mac.size();
        let record_type = additional_data::outer_record_type(false, &self.encrypt_connection_id, content_type);

        let mut buf = vec![0u8; header_allocation + total];
        let payload = header_allocation..header_allocation + inner_len;
        buf[header_allocation..header_allocation + plaintext.len()].copy_from_slice(plaintext);
        if use_inner {
            buf[payload.end - 1] = content_type.to_u8();
        }

        let mac = macs.write_mac.calculate_mac(seq_no, record_type, &self.encrypt_connection_id, &buf[payload.clone()]);
        buf[payload.end..].copy_from_slice(&mac);

        Ok(EncodedRecord { buf, offset: header_allocation, len: total, record_type })
    }

    fn decode<'a>(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        _record_version: ProtocolVersion,
        ciphertext: &'a mut [u8],
    ) -> Result<DecodedRecord<'a>, RecordError> {
        let Some(macs) = self.macs.as_mut() else {
            return Ok(DecodedRecord { plaintext: ciphertext, content_type: record_type });
        };

        let mac_size = macs.read_mac.size();
        if ciphertext.len() < mac_size {
            return Err(RecordError::DecodeError { reason: "record shorter than MAC" });
        }
        let mac_input_len = ciphertext.len() - mac_size;

        let expected =
            macs.read_mac.calculate_mac(seq_no, record_type, &self.decrypt_connection_id, &ciphertext[..mac_input_len]);
        if !bool::from(expected.ct_eq(&ciphertext[mac_input_len..])) {
            tracing::trace!(seq_no, "NULL record failed MAC check");
            return Err(RecordError::BadRecordMac);
        }

        let (len, content_type) = if self.decrypt_connection_id.is_empty() {
            (mac_input_len, record_type)
        } else {
            additional_data::strip_inner_plaintext(&ciphertext[..mac_input_len])?
        };

        Ok(DecodedRecord { plaintext: &ciphertext[..len], content_type })
    }

    fn uses_opaque_record_type(&self) -> bool {
        !self.decrypt_connection_id.is_empty()
    }
}

impl std::fmt::Debug for NullRecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("NullRecordCipher");
        match &self.macs {
            Some(macs) => s.field("version", &macs.ctx.version()).field("mac", &macs.write_mac),
            None => s.field("mac", &"none"),
        };
        s.finish_non_exhaustive()
    }
}
