//! Error types for cryptographic primitives

use thiserror::Error;

/// Errors from secrets, key derivation and bulk engines
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The secret was already extracted or destroyed
    #[error("secret is no longer alive")]
    DeadSecret,

    /// Key material has the wrong length for the algorithm
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// Requested derivation output is longer than the KDF can produce
    #[error("invalid output length: requested {requested}, max {max}")]
    InvalidOutputLength {
        /// Requested output length
        requested: usize,
        /// Largest permitted output length
        max: usize,
    },

    /// The algorithm cannot be used in this role
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(&'static str),

    /// The randomness source failed
    #[error("randomness source failed")]
    Randomness,

    /// AEAD tag verification failed
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A bulk engine rejected its input
    #[error("engine failure: {0}")]
    Engine(&'static str),
}

impl CryptoError {
    /// Returns true if this error is the result of caller misuse rather than
    /// a transient condition of the environment.
    ///
    /// A failing randomness source is environmental and a failed tag check
    /// is the peer's doing. Everything else indicates a wrong key size, a
    /// wrong algorithm choice or a reused secret.
    pub fn is_misuse(&self) -> bool {
        !matches!(self, Self::Randomness | Self::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_secret_is_misuse() {
        assert!(CryptoError::DeadSecret.is_misuse());
        assert!(CryptoError::InvalidKeyLength { expected: 16, actual: 15 }.is_misuse());
    }

    #[test]
    fn randomness_is_not_misuse() {
        assert!(!CryptoError::Randomness.is_misuse());
        assert!(!CryptoError::AuthenticationFailed.is_misuse());
    }

    #[test]
    fn error_display() {
        let err = CryptoError::InvalidKeyLength { expected: 32, actual: 16 };
        assert_eq!(err.to_string(), "invalid key length: expected 32, got 16");
    }
}
