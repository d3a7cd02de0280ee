//! Seeded randomness for reproducible record streams.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Mutex, PoisonError};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tlsrec_crypto::{CryptoError, NonceGenerator};

/// [`NonceGenerator`] backed by a ChaCha20 stream.
///
/// Two generators built from the same seed hand out the same bytes in the
/// same order, so explicit IVs, CBC padding lengths and the timing-mask
/// buffer all replay exactly.
pub struct SeededNonceGenerator {
    seed: u64,
    rng: Mutex<ChaCha20Rng>,
}

impl SeededNonceGenerator {
    /// Generator for `seed`.
    pub fn new(seed: u64) -> Self {
        Self { seed, rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)) }
    }

    /// Seed this generator was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl NonceGenerator for SeededNonceGenerator {
    fn fill_bytes(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buf);
        Ok(())
    }
}

impl std::fmt::Debug for SeededNonceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededNonceGenerator").field("seed", &self.seed).finish_non_exhaustive()
    }
}
