//! Single-use secret handles.
//!
//! A [`Secret`] owns key material that can be read into a derivation any
//! number of times but handed out exactly once. [`Secret::extract`] moves the
//! bytes out and leaves the handle dead; [`Secret::destroy`] zeroizes it in
//! place. Every later access fails with [`CryptoError::DeadSecret`].
//!
//! # Security
//!
//! - Material is held in [`Zeroizing`] buffers and wiped when dropped
//! - `Debug` never prints the bytes
//! - Handles are not `Clone`; a copy is only made through a derivation

#![allow(clippy::disallowed_types, reason = "secret state is guarded by a short synchronous lock")]

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use zeroize::Zeroizing;

use crate::{
    error::CryptoError,
    hash::HashAlgorithm,
    key_schedule::{self, PrfAlgorithm},
};

/// Handle to secret key material.
pub struct Secret {
    data: Mutex<Option<Zeroizing<Vec<u8>>>>,
}

impl Secret {
    /// Take ownership of `bytes`.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { data: Mutex::new(Some(Zeroizing::new(bytes.into()))) }
    }

    /// Whether the secret can still be read.
    pub fn is_alive(&self) -> bool {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Move the material out. The handle is dead afterwards.
    pub fn extract(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).take().ok_or(CryptoError::DeadSecret)
    }

    /// Zeroize the material and kill the handle. Idempotent.
    pub fn destroy(&self) {
        // Dropping the Zeroizing buffer wipes it
        drop(self.data.lock().unwrap_or_else(PoisonError::into_inner).take());
    }

    /// Run `f` over the material without consuming it.
    pub(crate) fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, CryptoError> {
        let guard = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let bytes = guard.as_ref().ok_or(CryptoError::DeadSecret)?;
        Ok(f(bytes))
    }

    /// Labelled PRF output as a new secret.
    pub fn derive_using_prf(
        &self,
        algorithm: PrfAlgorithm,
        label: &[u8],
        seed: &[u8],
        len: usize,
    ) -> Result<Secret, CryptoError> {
        let out = self.with_bytes(|s| key_schedule::prf(algorithm, s, label, seed, len))??;
        Ok(Self::from_zeroizing(out))
    }

    /// `HKDF-Expand-Label(self, label, context, len)` as a new secret.
    pub fn hkdf_expand_label(
        &self,
        hash: HashAlgorithm,
        prefix: &[u8],
        label: &[u8],
        context: &[u8],
        len: usize,
    ) -> Result<Secret, CryptoError> {
        let out = self
            .with_bytes(|s| key_schedule::hkdf_expand_label(hash, s, prefix, label, context, len))??;
        Ok(Self::from_zeroizing(out))
    }

    /// `HKDF-Extract(salt = self, ikm)` as a new secret.
    pub fn hkdf_extract(&self, hash: HashAlgorithm, ikm: &[u8]) -> Result<Secret, CryptoError> {
        let out = self.with_bytes(|salt| key_schedule::hkdf_extract(hash, salt, ikm))??;
        Ok(Self::from_zeroizing(out))
    }

    fn from_zeroizing(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self { data: Mutex::new(Some(bytes)) }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret").field("alive", &self.is_alive()).finish_non_exhaustive()
    }
}
