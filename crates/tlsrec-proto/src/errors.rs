//! Error types for wire-vocabulary parsing.

use thiserror::Error;

/// Result alias for wire-vocabulary operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised when raw wire values cannot be interpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The two version bytes do not name a supported TLS or DTLS version
    #[error("unknown protocol version: {major:#04x}.{minor:#04x}")]
    UnknownVersion {
        /// Major version byte
        major: u8,
        /// Minor version byte
        minor: u8,
    },

    /// The alert code is not one a record cipher can raise
    #[error("unknown alert description: {0}")]
    UnknownAlert(u8),
}
