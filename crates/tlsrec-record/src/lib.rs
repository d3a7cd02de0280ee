//! TLS and DTLS record protection.
//!
//! A [`RecordCipher`] turns plaintext fragments into protected records and
//! back. Four families implement it:
//!
//! | cipher                   | suites                                   |
//! |--------------------------|------------------------------------------|
//! | [`AeadRecordCipher`]     | GCM, CCM, `CCM_8`, ChaCha20-Poly1305     |
//! | [`BlockRecordCipher`]    | AES-CBC with HMAC or the SSLv3 MAC       |
//! | [`NullRecordCipher`]     | NULL encryption, with or without a MAC   |
//! | [`IntegrityOnlyCipher`]  | TLS 1.3 HMAC-only (RFC 9150)             |
//!
//! [`RecordProtection::for_suite`] picks one from a [`CipherSuite`] and the
//! [`CryptoContext`] of the connection.
//!
//! # Record Flow
//!
//! ```text
//! encode: plaintext ─► [inner type] ─► nonce/IV ─► seal or MAC+pad+CBC ─► EncodedRecord
//! decode: &mut ciphertext ─► open or MAC/pad check ─► strip inner type ─► DecodedRecord
//! ```
//!
//! Sequence numbers are supplied by the caller on every call; ciphers never
//! count records themselves.
//!
//! # Security
//!
//! - Tags, MACs and padding are compared in constant time
//! - CBC padding and MAC failures are reported identically
//! - Keys and IVs live in zeroizing buffers or are wiped on drop
//! - Authentication failures are logged at `trace` only after the decision

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod additional_data;
pub mod aead;
pub mod block;
pub mod contract;
pub mod error;
pub mod integrity;
pub mod nonce;
pub mod null;
pub mod params;
pub mod protection;
pub mod suite;
pub mod suite_mac;

pub use aead::AeadRecordCipher;
pub use block::BlockRecordCipher;
pub use contract::{DecodedRecord, EncodedRecord, RecordCipher};
pub use error::RecordError;
pub use integrity::IntegrityOnlyCipher;
pub use nonce::NonceMode;
pub use null::NullRecordCipher;
pub use params::{CryptoContext, SecurityParameters, SecurityParametersBuilder};
pub use protection::RecordProtection;
pub use suite::{BulkCipher, CipherSuite};
pub use suite_mac::SuiteMac;
