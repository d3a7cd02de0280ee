//! Per-record nonce construction.

use tlsrec_crypto::AEAD_NONCE_LEN;

/// How an AEAD record cipher turns its fixed IV and the sequence number into
/// a nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceMode {
    /// RFC 5288: 4-byte fixed IV || 8-byte explicit nonce sent in the record.
    /// The explicit part is the sequence number.
    Explicit,
    /// RFC 7905 / RFC 8446 §5.3: fixed IV XOR sequence number, nothing sent.
    Implicit,
}

/// Bytes of fixed IV in explicit mode.
pub const EXPLICIT_FIXED_IV_LEN: usize = 4;

/// Bytes of explicit nonce carried in each record.
pub const EXPLICIT_NONCE_LEN: usize = 8;

impl NonceMode {
    /// Fixed IV length taken from the key block or HKDF.
    pub fn fixed_iv_len(self) -> usize {
        match self {
            Self::Explicit => EXPLICIT_FIXED_IV_LEN,
            Self::Implicit => AEAD_NONCE_LEN,
        }
    }

    /// Nonce bytes prepended to each record.
    pub fn record_iv_len(self) -> usize {
        match self {
            Self::Explicit => EXPLICIT_NONCE_LEN,
            Self::Implicit => 0,
        }
    }
}

/// `fixed_iv[..4] || explicit`.
pub fn explicit_nonce(fixed_iv: &[u8], explicit: &[u8; EXPLICIT_NONCE_LEN]) -> [u8; AEAD_NONCE_LEN] {
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    nonce[..EXPLICIT_FIXED_IV_LEN].copy_from_slice(&fixed_iv[..EXPLICIT_FIXED_IV_LEN]);
    nonce[EXPLICIT_FIXED_IV_LEN..].copy_from_slice(explicit);
    nonce
}

/// `iv XOR seq_no`, with the big-endian sequence number right-aligned
/// (left-padded with zeros to the IV length). `out` must be as long as `iv`,
/// and both at least 8 bytes.
pub fn write_implicit_nonce(iv: &[u8], seq_no: u64, out: &mut [u8]) {
    out.copy_from_slice(iv);
    let tail = out.len() - 8;
    for (o, s) in out[tail..].iter_mut().zip(seq_no.to_be_bytes()) {
        *o ^= s;
    }
}

/// [`write_implicit_nonce`] for a 12-byte AEAD IV.
pub fn implicit_nonce(iv: &[u8; AEAD_NONCE_LEN], seq_no: u64) -> [u8; AEAD_NONCE_LEN] {
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    write_implicit_nonce(iv, seq_no, &mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn explicit_nonce_layout(fixed in any::<[u8; 4]>(), seq in any::<u64>()) {
            let nonce = explicit_nonce(&fixed, &seq.to_be_bytes());
            // PROPERTY: nonce = fixed_iv || big-endian seq_no
            prop_assert_eq!(&nonce[..4], &fixed[..]);
            prop_assert_eq!(&nonce[4..], &seq.to_be_bytes()[..]);
        }

        #[test]
        fn implicit_nonce_is_xor(iv in any::<[u8; 12]>(), seq in any::<u64>()) {
            let nonce = implicit_nonce(&iv, seq);
            let mut padded = [0u8; 12];
            padded[4..].copy_from_slice(&seq.to_be_bytes());
            for i in 0..12 {
                prop_assert_eq!(nonce[i], iv[i] ^ padded[i]);
            }
        }
    }

    #[test]
    fn implicit_nonce_rfc8446_example() {
        // seq 1 flips only the last bit
        let iv = [0u8; 12];
        let mut expected = [0u8; 12];
        expected[11] = 1;
        assert_eq!(implicit_nonce(&iv, 1), expected);
    }

    #[test]
    fn write_implicit_nonce_for_hash_length_iv() {
        let iv = [0xffu8; 32];
        let mut out = [0u8; 32];
        write_implicit_nonce(&iv, 0x0102, &mut out);
        assert_eq!(&out[..30], &[0xff; 30]);
        assert_eq!(&out[30..], &[0xfe, 0xfd]);
    }

    #[test]
    fn modes() {
        assert_eq!(NonceMode::Explicit.fixed_iv_len() + NonceMode::Explicit.record_iv_len(), 12);
        assert_eq!(NonceMode::Implicit.record_iv_len(), 0);
    }
}
