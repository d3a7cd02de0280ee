//! Keyed MACs for record authentication and the legacy PRF.
//!
//! [`TlsHmac`] is a streaming MAC with an explicit reset, so callers can keep
//! feeding it after a result has been taken. The constant-time record MAC
//! relies on that: it pushes dummy blocks through the same keyed state that
//! produced the real tag.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::{
    error::CryptoError,
    hash::{DigestState, HashAlgorithm},
};

/// MAC algorithm negotiated for a non-AEAD cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacAlgorithm {
    /// No MAC (the null/null suite)
    Null,
    /// HMAC over the given hash
    Hmac(HashAlgorithm),
    /// SSLv3 MAC (MD5 or SHA-1 only)
    Ssl3(HashAlgorithm),
}

impl MacAlgorithm {
    /// Full tag length in bytes; also the MAC key length taken from the key
    /// block.
    pub fn output_len(self) -> usize {
        match self {
            Self::Null => 0,
            Self::Hmac(hash) | Self::Ssl3(hash) => hash.output_len(),
        }
    }
}

/// SSLv3 pad bytes are repeated 48 times for MD5 and 40 times for SHA-1.
fn ssl3_pad_len(hash: HashAlgorithm) -> usize {
    if hash == HashAlgorithm::Md5 { 48 } else { 40 }
}

enum HmacState {
    Md5(Hmac<Md5>),
    Sha1(Hmac<Sha1>),
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
    Ssl3 { hash: HashAlgorithm, secret: Zeroizing<Vec<u8>>, inner: DigestState },
}

impl Clone for HmacState {
    fn clone(&self) -> Self {
        match self {
            Self::Md5(m) => Self::Md5(m.clone()),
            Self::Sha1(m) => Self::Sha1(m.clone()),
            Self::Sha256(m) => Self::Sha256(m.clone()),
            Self::Sha384(m) => Self::Sha384(m.clone()),
            Self::Sha512(m) => Self::Sha512(m.clone()),
            Self::Ssl3 { hash, secret, inner } => {
                Self::Ssl3 { hash: *hash, secret: secret.clone(), inner: inner.clone() }
            },
        }
    }
}

impl HmacState {
    fn new(algorithm: MacAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let Ok(state) = (match algorithm {
            MacAlgorithm::Hmac(HashAlgorithm::Md5) => Hmac::<Md5>::new_from_slice(key).map(Self::Md5),
            MacAlgorithm::Hmac(HashAlgorithm::Sha1) => {
                Hmac::<Sha1>::new_from_slice(key).map(Self::Sha1)
            },
            MacAlgorithm::Hmac(HashAlgorithm::Sha256) => {
                Hmac::<Sha256>::new_from_slice(key).map(Self::Sha256)
            },
            MacAlgorithm::Hmac(HashAlgorithm::Sha384) => {
                Hmac::<Sha384>::new_from_slice(key).map(Self::Sha384)
            },
            MacAlgorithm::Hmac(HashAlgorithm::Sha512) => {
                Hmac::<Sha512>::new_from_slice(key).map(Self::Sha512)
            },
            MacAlgorithm::Ssl3(hash @ (HashAlgorithm::Md5 | HashAlgorithm::Sha1)) => {
                return Ok(Self::ssl3(hash, key));
            },
            MacAlgorithm::Ssl3(_) => {
                return Err(CryptoError::UnsupportedAlgorithm("SSLv3 MAC requires MD5 or SHA-1"));
            },
            MacAlgorithm::Null => {
                return Err(CryptoError::UnsupportedAlgorithm("null MAC cannot be keyed"));
            },
        }) else {
            unreachable!("HMAC accepts any key size");
        };
        Ok(state)
    }

    fn ssl3(hash: HashAlgorithm, key: &[u8]) -> Self {
        let mut inner = DigestState::new(hash);
        inner.update(key);
        inner.update(&vec![0x36; ssl3_pad_len(hash)]);
        Self::Ssl3 { hash, secret: Zeroizing::new(key.to_vec()), inner }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(m) => m.update(data),
            Self::Sha1(m) => m.update(data),
            Self::Sha256(m) => m.update(data),
            Self::Sha384(m) => m.update(data),
            Self::Sha512(m) => m.update(data),
            Self::Ssl3 { inner, .. } => inner.update(data),
        }
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        match *self {
            Self::Md5(m) => m.finalize().into_bytes().to_vec(),
            Self::Sha1(m) => m.finalize().into_bytes().to_vec(),
            Self::Sha256(m) => m.finalize().into_bytes().to_vec(),
            Self::Sha384(m) => m.finalize().into_bytes().to_vec(),
            Self::Sha512(m) => m.finalize().into_bytes().to_vec(),
            Self::Ssl3 { hash, secret, inner } => {
                let inner_digest = inner.finalize();
                let mut outer = DigestState::new(hash);
                outer.update(&secret);
                outer.update(&vec![0x5c; ssl3_pad_len(hash)]);
                outer.update(&inner_digest);
                outer.finalize()
            },
        }
    }
}

/// Streaming keyed MAC.
///
/// Holds the freshly keyed state as a template. [`Self::calculate_mac`]
/// finalizes the running state and replaces it with a copy of the template,
/// so the instance is immediately ready for the next record.
#[derive(Clone)]
pub struct TlsHmac {
    algorithm: MacAlgorithm,
    template: Box<HmacState>,
    current: Box<HmacState>,
}

impl TlsHmac {
    /// Key a MAC. Any key length is accepted.
    pub fn new(algorithm: MacAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let template = Box::new(HmacState::new(algorithm, key)?);
        Ok(Self { algorithm, current: template.clone(), template })
    }

    /// Algorithm this MAC was keyed for.
    pub fn algorithm(&self) -> MacAlgorithm {
        self.algorithm
    }

    /// Full tag length.
    pub fn mac_len(&self) -> usize {
        self.algorithm.output_len()
    }

    /// Compression-function block size of the underlying hash.
    pub fn block_len(&self) -> usize {
        self.hash().block_len()
    }

    /// Length-encoding overhead of the underlying hash.
    pub fn padding_overhead(&self) -> usize {
        self.hash().padding_overhead()
    }

    fn hash(&self) -> HashAlgorithm {
        match self.algorithm {
            MacAlgorithm::Hmac(hash) | MacAlgorithm::Ssl3(hash) => hash,
            MacAlgorithm::Null => unreachable!("null MAC is never keyed"),
        }
    }

    /// Absorb `data` into the running computation.
    pub fn update(&mut self, data: &[u8]) {
        self.current.update(data);
    }

    /// Finish the running computation and reset to the keyed state.
    pub fn calculate_mac(&mut self) -> Vec<u8> {
        let done = std::mem::replace(&mut self.current, self.template.clone());
        done.finalize()
    }

    /// Discard the running computation.
    pub fn reset(&mut self) {
        self.current = self.template.clone();
    }
}
