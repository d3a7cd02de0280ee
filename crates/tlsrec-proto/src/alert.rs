//! Alert descriptions raised by the record protection layer.

use std::fmt;

use crate::errors::ProtocolError;

/// Fatal alerts a record cipher can surface to the record layer.
///
/// The record layer maps these onto the alert it sends before closing the
/// connection. Every one of them is fatal; records are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertDescription {
    /// Well-formed ciphertext whose inner plaintext is invalid
    UnexpectedMessage = 10,
    /// Authentication (or CBC padding) failure
    BadRecordMac = 20,
    /// Malformed or undersized ciphertext
    DecodeError = 50,
    /// Misuse of the cipher, a bug on our side
    InternalError = 80,
}

impl AlertDescription {
    /// Wire code of the alert.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// RFC name of the alert.
    pub fn name(self) -> &'static str {
        match self {
            Self::UnexpectedMessage => "unexpected_message",
            Self::BadRecordMac => "bad_record_mac",
            Self::DecodeError => "decode_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl TryFrom<u8> for AlertDescription {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            10 => Ok(Self::UnexpectedMessage),
            20 => Ok(Self::BadRecordMac),
            50 => Ok(Self::DecodeError),
            80 => Ok(Self::InternalError),
            other => Err(ProtocolError::UnknownAlert(other)),
        }
    }
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_rfc() {
        assert_eq!(AlertDescription::UnexpectedMessage.code(), 10);
        assert_eq!(AlertDescription::BadRecordMac.code(), 20);
        assert_eq!(AlertDescription::DecodeError.code(), 50);
        assert_eq!(AlertDescription::InternalError.code(), 80);
    }

    #[test]
    fn try_from_roundtrips_known_codes() {
        for alert in [
            AlertDescription::UnexpectedMessage,
            AlertDescription::BadRecordMac,
            AlertDescription::DecodeError,
            AlertDescription::InternalError,
        ] {
            assert_eq!(AlertDescription::try_from(alert.code()), Ok(alert));
        }
        assert_eq!(AlertDescription::try_from(0), Err(ProtocolError::UnknownAlert(0)));
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(AlertDescription::BadRecordMac.to_string(), "bad_record_mac(20)");
    }
}
