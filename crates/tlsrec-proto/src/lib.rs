//! Record-layer wire vocabulary.
//!
//! Types shared by every layer that touches a TLS or DTLS record: protocol
//! versions, record content types, the alert descriptions a record cipher can
//! raise, and which end of the connection we are.
//!
//! Nothing here performs cryptography. The values are plain `Copy` types so the
//! record ciphers can embed them in additional data and MAC headers without
//! allocation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod alert;
pub mod content_type;
pub mod errors;
pub mod version;

pub use alert::AlertDescription;
pub use content_type::ContentType;
pub use errors::{ProtocolError, Result};
pub use version::ProtocolVersion;

/// Which side of the connection a crypto context belongs to.
///
/// Determines whether the encoder uses the client or the server half of the
/// key block (and traffic secrets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEnd {
    /// The connection initiator.
    Client,
    /// The connection acceptor.
    Server,
}

impl ConnectionEnd {
    /// True for [`ConnectionEnd::Server`].
    pub fn is_server(self) -> bool {
        matches!(self, Self::Server)
    }

    /// The opposite end.
    #[must_use]
    pub fn peer(self) -> Self {
        match self {
            Self::Client => Self::Server,
            Self::Server => Self::Client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_is_involution() {
        assert_eq!(ConnectionEnd::Client.peer(), ConnectionEnd::Server);
        assert_eq!(ConnectionEnd::Server.peer().peer(), ConnectionEnd::Server);
        assert!(ConnectionEnd::Server.is_server());
        assert!(!ConnectionEnd::Client.is_server());
    }
}
