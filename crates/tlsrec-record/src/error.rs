//! Record protection errors.
//!
//! Every error is fatal to the connection. The variant decides which alert the
//! record layer sends before closing; there is no retry at this layer.

use thiserror::Error;
use tlsrec_crypto::CryptoError;
use tlsrec_proto::AlertDescription;

/// Failure while protecting or unprotecting a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Ciphertext is malformed or too short for the cipher
    #[error("decode error: {reason}")]
    DecodeError {
        /// What was wrong with the record
        reason: &'static str,
    },

    /// Authentication failed.
    ///
    /// Carries no detail. For CBC suites this also covers a bad padding, and
    /// the two must be indistinguishable.
    #[error("bad record MAC")]
    BadRecordMac,

    /// The cipher was misused or mispredicted its own output; a bug
    #[error("internal error: {reason}")]
    InternalError {
        /// Description of the misuse
        reason: String,
    },

    /// The record authenticated but its inner plaintext is invalid
    #[error("unexpected message: {reason}")]
    UnexpectedMessage {
        /// What was wrong with the inner plaintext
        reason: &'static str,
    },
}

impl RecordError {
    /// Alert the record layer sends for this error.
    pub fn alert(&self) -> AlertDescription {
        match self {
            Self::DecodeError { .. } => AlertDescription::DecodeError,
            Self::BadRecordMac => AlertDescription::BadRecordMac,
            Self::InternalError { .. } => AlertDescription::InternalError,
            Self::UnexpectedMessage { .. } => AlertDescription::UnexpectedMessage,
        }
    }

    /// Returns true if the connection must be closed.
    ///
    /// Records are never retried, so this holds for every variant.
    pub fn is_fatal(&self) -> bool {
        true
    }

    pub(crate) fn internal(reason: impl Into<String>) -> Self {
        Self::InternalError { reason: reason.into() }
    }
}

impl From<CryptoError> for RecordError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => Self::BadRecordMac,
            other => Self::InternalError { reason: other.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_match_taxonomy() {
        assert_eq!(RecordError::DecodeError { reason: "short" }.alert(), AlertDescription::DecodeError);
        assert_eq!(RecordError::BadRecordMac.alert(), AlertDescription::BadRecordMac);
        assert_eq!(RecordError::internal("oops").alert(), AlertDescription::InternalError);
        assert_eq!(
            RecordError::UnexpectedMessage { reason: "zeros" }.alert(),
            AlertDescription::UnexpectedMessage
        );
    }

    #[test]
    fn every_error_is_fatal() {
        assert!(RecordError::BadRecordMac.is_fatal());
        assert!(RecordError::DecodeError { reason: "x" }.is_fatal());
    }

    #[test]
    fn crypto_errors_map_to_internal_except_auth() {
        assert_eq!(RecordError::from(CryptoError::AuthenticationFailed), RecordError::BadRecordMac);
        assert_eq!(
            RecordError::from(CryptoError::DeadSecret),
            RecordError::InternalError { reason: "secret is no longer alive".to_string() }
        );
    }

    #[test]
    fn bad_record_mac_display_has_no_detail() {
        assert_eq!(RecordError::BadRecordMac.to_string(), "bad record MAC");
    }
}
