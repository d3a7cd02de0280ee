//! AES in CBC mode with chaining state that persists across calls.
//!
//! TLS 1.0 chains the last ciphertext block of one record into the next
//! record's IV, so the chaining value lives in the cipher rather than being
//! passed per call. Later versions prepend a random block to every record and
//! initialise the chain with zeros; the same engine serves both.

use std::fmt;

use aes::{
    Aes128, Aes256,
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// AES block size; the only block cipher the record layer carries.
pub const AES_BLOCK_SIZE: usize = 16;

/// Block cipher selected by a CBC cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockAlgorithm {
    /// AES with a 128-bit key
    Aes128,
    /// AES with a 256-bit key
    Aes256,
}

impl BlockAlgorithm {
    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    /// Block length in bytes.
    pub fn block_len(self) -> usize {
        AES_BLOCK_SIZE
    }
}

enum AesKey {
    Aes128(Box<Aes128>),
    Aes256(Box<Aes256>),
}

/// One direction of a CBC stream.
pub struct CbcCipher {
    algorithm: BlockAlgorithm,
    key: AesKey,
    chain: [u8; AES_BLOCK_SIZE],
}

impl CbcCipher {
    /// Key the cipher and set the initial chaining value.
    pub fn new(algorithm: BlockAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let bad_key = |_| CryptoError::InvalidKeyLength { expected: algorithm.key_len(), actual: key.len() };
        let key = match algorithm {
            BlockAlgorithm::Aes128 => AesKey::Aes128(Box::new(Aes128::new_from_slice(key).map_err(bad_key)?)),
            BlockAlgorithm::Aes256 => AesKey::Aes256(Box::new(Aes256::new_from_slice(key).map_err(bad_key)?)),
        };
        let chain = <[u8; AES_BLOCK_SIZE]>::try_from(iv)
            .map_err(|_| CryptoError::InvalidKeyLength { expected: AES_BLOCK_SIZE, actual: iv.len() })?;
        Ok(Self { algorithm, key, chain })
    }

    /// Algorithm this instance was keyed for.
    pub fn algorithm(&self) -> BlockAlgorithm {
        self.algorithm
    }

    /// Block length in bytes.
    pub fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    /// Encrypt whole blocks in place, continuing the chain.
    pub fn encrypt_in_place(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        check_aligned(data)?;
        for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            for (b, c) in block.iter_mut().zip(self.chain.iter()) {
                *b ^= c;
            }
            let block = GenericArray::from_mut_slice(block);
            match &self.key {
                AesKey::Aes128(k) => k.encrypt_block(block),
                AesKey::Aes256(k) => k.encrypt_block(block),
            }
            self.chain.copy_from_slice(block);
        }
        Ok(())
    }

    /// Decrypt whole blocks in place, continuing the chain.
    pub fn decrypt_in_place(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        check_aligned(data)?;
        for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut next_chain = [0u8; AES_BLOCK_SIZE];
            next_chain.copy_from_slice(block);

            let ga = GenericArray::from_mut_slice(block);
            match &self.key {
                AesKey::Aes128(k) => k.decrypt_block(ga),
                AesKey::Aes256(k) => k.decrypt_block(ga),
            }
            for (b, c) in block.iter_mut().zip(self.chain.iter()) {
                *b ^= c;
            }
            self.chain = next_chain;
        }
        Ok(())
    }
}

fn check_aligned(data: &[u8]) -> Result<(), CryptoError> {
    if data.len() % AES_BLOCK_SIZE == 0 {
        Ok(())
    } else {
        Err(CryptoError::Engine("CBC input is not block aligned"))
    }
}

impl Drop for CbcCipher {
    fn drop(&mut self) {
        self.chain.zeroize();
    }
}

impl fmt::Debug for CbcCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbcCipher").field("algorithm", &self.algorithm).finish_non_exhaustive()
    }
}
