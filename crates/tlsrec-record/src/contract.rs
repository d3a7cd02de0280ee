//! The contract every record cipher implements.

use tlsrec_proto::{ContentType, ProtocolVersion};

use crate::error::RecordError;

/// A protected record ready for the wire.
///
/// `buf[..offset]` is the space the caller reserved for its record header;
/// the protected fragment is `buf[offset..offset + len]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    /// Output buffer, header space included
    pub buf: Vec<u8>,
    /// Start of the protected fragment (equals the header allocation)
    pub offset: usize,
    /// Length of the protected fragment
    pub len: usize,
    /// Content type to write in the outer record header
    pub record_type: ContentType,
}

impl EncodedRecord {
    /// The protected fragment.
    pub fn fragment(&self) -> &[u8] {
        &self.buf[self.offset..self.offset + self.len]
    }
}

/// A record recovered by [`RecordCipher::decode`].
///
/// The plaintext borrows the caller's ciphertext buffer, which the decoder
/// transformed in place.
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    /// Recovered payload
    pub plaintext: &'a [u8],
    /// True content type (the inner type when the outer one is opaque)
    pub content_type: ContentType,
}

/// Record protection for one direction pair of a connection.
///
/// Callers serialize calls per direction; the cipher does no locking of its
/// own. Sequence numbers are supplied per call and never stored. For DTLS the
/// caller packs `epoch || sequence_number` into the `u64`.
///
/// # Aliasing
///
/// [`Self::decode`] always works in place: the ciphertext buffer is
/// overwritten and the returned plaintext points into it. On error the buffer
/// contents are unspecified and no plaintext is returned. [`Self::encode`]
/// never aliases its input.
pub trait RecordCipher {
    /// Largest ciphertext a peer may send for `plaintext_limit` bytes of
    /// plaintext.
    fn ciphertext_decode_limit(&self, plaintext_limit: usize) -> usize;

    /// Largest ciphertext [`Self::encode`] produces for `plaintext_length`
    /// bytes, never more than `plaintext_limit`.
    fn ciphertext_encode_limit(&self, plaintext_length: usize, plaintext_limit: usize) -> usize;

    /// Most plaintext a received ciphertext of `ciphertext_limit` bytes can
    /// carry.
    fn plaintext_decode_limit(&self, ciphertext_limit: usize) -> usize;

    /// Most plaintext that fits in a ciphertext of `ciphertext_limit` bytes.
    fn plaintext_encode_limit(&self, ciphertext_limit: usize) -> usize;

    /// Protect one record.
    fn encode(
        &mut self,
        seq_no: u64,
        content_type: ContentType,
        record_version: ProtocolVersion,
        header_allocation: usize,
        plaintext: &[u8],
    ) -> Result<EncodedRecord, RecordError>;

    /// Unprotect one record in place.
    fn decode<'a>(
        &mut self,
        seq_no: u64,
        record_type: ContentType,
        record_version: ProtocolVersion,
        ciphertext: &'a mut [u8],
    ) -> Result<DecodedRecord<'a>, RecordError>;

    /// Re-derive the write key and IV from the current traffic secret.
    ///
    /// Only TLS 1.3 ciphers support this.
    fn rekey_encoder(&mut self) -> Result<(), RecordError> {
        Err(RecordError::internal("rekey is not supported by this cipher"))
    }

    /// Re-derive the read key and IV from the current traffic secret.
    fn rekey_decoder(&mut self) -> Result<(), RecordError> {
        Err(RecordError::internal("rekey is not supported by this cipher"))
    }

    /// True when the outer record type is always `application_data` or
    /// `tls12_cid` and the real type travels inside the plaintext.
    fn uses_opaque_record_type(&self) -> bool {
        false
    }
}
