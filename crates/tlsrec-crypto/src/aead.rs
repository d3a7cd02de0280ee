//! AEAD engines behind one detached seal/open interface.
//!
//! Record ciphers lay out `ciphertext || tag` in a single buffer. [`AeadEngine`]
//! works on that buffer in place and never allocates, so the output size is
//! always `input + tag_len` on seal and `input - tag_len` on open.

use std::fmt;

use aes::{Aes128, Aes256};
use aes_gcm::{
    Aes128Gcm, Aes256Gcm,
    aead::{
        AeadInPlace, KeyInit,
        consts::{U8, U12, U16},
        generic_array::GenericArray,
    },
};
use ccm::Ccm;
use chacha20poly1305::ChaCha20Poly1305;

use crate::error::CryptoError;

/// Every TLS AEAD uses a 12-byte nonce.
pub const AEAD_NONCE_LEN: usize = 12;

type Aes128Ccm = Ccm<Aes128, U16, U12>;
type Aes256Ccm = Ccm<Aes256, U16, U12>;
type Aes128Ccm8 = Ccm<Aes128, U8, U12>;
type Aes256Ccm8 = Ccm<Aes256, U8, U12>;

/// AEAD algorithm negotiated by the cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgorithm {
    /// AES-128-GCM (RFC 5288)
    Aes128Gcm,
    /// AES-256-GCM (RFC 5288)
    Aes256Gcm,
    /// AES-128-CCM with a 16-byte tag (RFC 6655)
    Aes128Ccm,
    /// AES-256-CCM with a 16-byte tag (RFC 6655)
    Aes256Ccm,
    /// AES-128-CCM with an 8-byte tag (RFC 6655)
    Aes128Ccm8,
    /// AES-256-CCM with an 8-byte tag (RFC 6655)
    Aes256Ccm8,
    /// ChaCha20-Poly1305 (RFC 7905)
    ChaCha20Poly1305,
}

/// Construction family of an AEAD algorithm; decides the nonce mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadFamily {
    /// Galois/Counter Mode
    Gcm,
    /// Counter with CBC-MAC
    Ccm,
    /// ChaCha20 with Poly1305
    ChaCha20Poly1305,
}

impl AeadAlgorithm {
    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm | Self::Aes128Ccm | Self::Aes128Ccm8 => 16,
            Self::Aes256Gcm | Self::Aes256Ccm | Self::Aes256Ccm8 | Self::ChaCha20Poly1305 => 32,
        }
    }

    /// Authentication tag length in bytes.
    pub fn tag_len(self) -> usize {
        match self {
            Self::Aes128Ccm8 | Self::Aes256Ccm8 => 8,
            _ => 16,
        }
    }

    /// Construction family.
    pub fn family(self) -> AeadFamily {
        match self {
            Self::Aes128Gcm | Self::Aes256Gcm => AeadFamily::Gcm,
            Self::Aes128Ccm | Self::Aes256Ccm | Self::Aes128Ccm8 | Self::Aes256Ccm8 => AeadFamily::Ccm,
            Self::ChaCha20Poly1305 => AeadFamily::ChaCha20Poly1305,
        }
    }
}

enum EngineKey {
    Aes128Gcm(Box<Aes128Gcm>),
    Aes256Gcm(Box<Aes256Gcm>),
    Aes128Ccm(Box<Aes128Ccm>),
    Aes256Ccm(Box<Aes256Ccm>),
    Aes128Ccm8(Box<Aes128Ccm8>),
    Aes256Ccm8(Box<Aes256Ccm8>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

/// A keyed AEAD instance.
pub struct AeadEngine {
    algorithm: AeadAlgorithm,
    key: EngineKey,
}

impl AeadEngine {
    /// Key an engine. The key must be exactly [`AeadAlgorithm::key_len`].
    pub fn new(algorithm: AeadAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let bad_key = |_| CryptoError::InvalidKeyLength { expected: algorithm.key_len(), actual: key.len() };
        let key = match algorithm {
            AeadAlgorithm::Aes128Gcm => EngineKey::Aes128Gcm(Box::new(Aes128Gcm::new_from_slice(key).map_err(bad_key)?)),
            AeadAlgorithm::Aes256Gcm => EngineKey::Aes256Gcm(Box::new(Aes256Gcm::new_from_slice(key).map_err(bad_key)?)),
            AeadAlgorithm::Aes128Ccm => EngineKey::Aes128Ccm(Box::new(Aes128Ccm::new_from_slice(key).map_err(bad_key)?)),
            AeadAlgorithm::Aes256Ccm => EngineKey::Aes256Ccm(Box::new(Aes256Ccm::new_from_slice(key).map_err(bad_key)?)),
            AeadAlgorithm::Aes128Ccm8 => {
                EngineKey::Aes128Ccm8(Box::new(Aes128Ccm8::new_from_slice(key).map_err(bad_key)?))
            },
            AeadAlgorithm::Aes256Ccm8 => {
                EngineKey::Aes256Ccm8(Box::new(Aes256Ccm8::new_from_slice(key).map_err(bad_key)?))
            },
            AeadAlgorithm::ChaCha20Poly1305 => {
                EngineKey::ChaCha20Poly1305(Box::new(ChaCha20Poly1305::new_from_slice(key).map_err(bad_key)?))
            },
        };
        Ok(Self { algorithm, key })
    }

    /// Algorithm this engine was keyed for.
    pub fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }

    /// Tag length in bytes.
    pub fn tag_len(&self) -> usize {
        self.algorithm.tag_len()
    }

    /// Output length for an input of `len` bytes. Open returns 0 for inputs
    /// shorter than a tag.
    pub fn output_size(&self, sealing: bool, len: usize) -> usize {
        if sealing { len + self.tag_len() } else { len.saturating_sub(self.tag_len()) }
    }

    /// Encrypt `buf[..len - tag_len]` in place and write the tag into the
    /// trailing `tag_len` bytes.
    pub fn seal(&self, nonce: &[u8], aad: &[u8], buf: &mut [u8]) -> Result<(), CryptoError> {
        let tag_len = self.check(nonce, buf)?;
        match &self.key {
            EngineKey::Aes128Gcm(c) => seal_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes256Gcm(c) => seal_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes128Ccm(c) => seal_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes256Ccm(c) => seal_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes128Ccm8(c) => seal_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes256Ccm8(c) => seal_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::ChaCha20Poly1305(c) => seal_detached(c.as_ref(), nonce, aad, buf, tag_len),
        }
    }

    /// Verify the trailing tag and decrypt the rest of `buf` in place.
    ///
    /// Returns the plaintext length. On [`CryptoError::AuthenticationFailed`]
    /// the buffer contents are unspecified and must be discarded.
    pub fn open(&self, nonce: &[u8], aad: &[u8], buf: &mut [u8]) -> Result<usize, CryptoError> {
        let tag_len = self.check(nonce, buf)?;
        match &self.key {
            EngineKey::Aes128Gcm(c) => open_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes256Gcm(c) => open_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes128Ccm(c) => open_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes256Ccm(c) => open_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes128Ccm8(c) => open_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::Aes256Ccm8(c) => open_detached(c.as_ref(), nonce, aad, buf, tag_len),
            EngineKey::ChaCha20Poly1305(c) => open_detached(c.as_ref(), nonce, aad, buf, tag_len),
        }
    }

    fn check(&self, nonce: &[u8], buf: &[u8]) -> Result<usize, CryptoError> {
        if nonce.len() != AEAD_NONCE_LEN {
            return Err(CryptoError::Engine("AEAD nonce must be 12 bytes"));
        }
        let tag_len = self.tag_len();
        if buf.len() < tag_len {
            return Err(CryptoError::Engine("buffer shorter than the AEAD tag"));
        }
        Ok(tag_len)
    }
}

fn seal_detached<A: AeadInPlace>(
    cipher: &A,
    nonce: &[u8],
    aad: &[u8],
    buf: &mut [u8],
    tag_len: usize,
) -> Result<(), CryptoError> {
    let (msg, tag_out) = buf.split_at_mut(buf.len() - tag_len);
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, msg)
        .map_err(|_| CryptoError::Engine("AEAD seal failed"))?;
    tag_out.copy_from_slice(&tag);
    Ok(())
}

fn open_detached<A: AeadInPlace>(
    cipher: &A,
    nonce: &[u8],
    aad: &[u8],
    buf: &mut [u8],
    tag_len: usize,
) -> Result<usize, CryptoError> {
    let (msg, tag) = buf.split_at_mut(buf.len() - tag_len);
    cipher
        .decrypt_in_place_detached(GenericArray::from_slice(nonce), aad, msg, GenericArray::from_slice(tag))
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    Ok(msg.len())
}

impl fmt::Debug for AeadEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadEngine").field("algorithm", &self.algorithm).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AeadAlgorithm; 7] = [
        AeadAlgorithm::Aes128Gcm,
        AeadAlgorithm::Aes256Gcm,
        AeadAlgorithm::Aes128Ccm,
        AeadAlgorithm::Aes256Ccm,
        AeadAlgorithm::Aes128Ccm8,
        AeadAlgorithm::Aes256Ccm8,
        AeadAlgorithm::ChaCha20Poly1305,
    ];

    #[test]
    fn seal_open_every_algorithm() {
        for alg in ALL {
            let engine = AeadEngine::new(alg, &vec![0x42; alg.key_len()]).unwrap();
            let nonce = [9u8; AEAD_NONCE_LEN];

            let mut buf = b"attack at dawn".to_vec();
            buf.resize(engine.output_size(true, buf.len()), 0);
            engine.seal(&nonce, b"aad", &mut buf).unwrap();
            assert_ne!(&buf[..14], b"attack at dawn", "{alg:?}");

            let len = engine.open(&nonce, b"aad", &mut buf).unwrap();
            assert_eq!(len, engine.output_size(false, buf.len()));
            assert_eq!(&buf[..len], b"attack at dawn", "{alg:?}");
        }
    }

    #[test]
    fn open_rejects_wrong_aad() {
        let engine = AeadEngine::new(AeadAlgorithm::Aes128Gcm, &[1; 16]).unwrap();
        let nonce = [0u8; AEAD_NONCE_LEN];
        let mut buf = vec![0u8; 5 + 16];
        engine.seal(&nonce, b"one", &mut buf).unwrap();
        assert_eq!(engine.open(&nonce, b"two", &mut buf), Err(CryptoError::AuthenticationFailed));
    }

    /// GCM reference test case 2: zero key, zero IV, one zero block.
    #[test]
    fn aes128_gcm_known_answer() {
        let engine = AeadEngine::new(AeadAlgorithm::Aes128Gcm, &[0; 16]).unwrap();
        let mut buf = vec![0u8; 32];
        engine.seal(&[0; AEAD_NONCE_LEN], &[], &mut buf).unwrap();
        assert_eq!(
            hex::encode(&buf),
            "0388dace60b6a392f328c2b971b2fe78ab6e47d42cec13bdf53a67b21257bddf"
        );
    }

    #[test]
    fn tag_lengths() {
        assert_eq!(AeadAlgorithm::Aes128Ccm8.tag_len(), 8);
        assert_eq!(AeadAlgorithm::ChaCha20Poly1305.tag_len(), 16);
        assert_eq!(AeadAlgorithm::ChaCha20Poly1305.family(), AeadFamily::ChaCha20Poly1305);
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(matches!(
            AeadEngine::new(AeadAlgorithm::Aes256Gcm, &[0; 16]),
            Err(CryptoError::InvalidKeyLength { expected: 32, actual: 16 })
        ));
        let engine = AeadEngine::new(AeadAlgorithm::Aes128Gcm, &[0; 16]).unwrap();
        assert!(engine.seal(&[0; 8], &[], &mut [0; 16]).is_err());
        assert!(engine.open(&[0; 12], &[], &mut [0; 15]).is_err());
        assert_eq!(engine.output_size(false, 3), 0);
    }
}
