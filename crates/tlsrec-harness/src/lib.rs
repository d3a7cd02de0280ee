//! Deterministic client/server harness for TLS record protection.
//!
//! A [`ConnectionPair`] holds two [`Endpoint`]s keyed from one seed, as if a
//! handshake had just finished. Endpoints frame protected records with real
//! TLS or DTLS headers, count sequence numbers and run TLS 1.3 key updates,
//! so tests can drive full record streams without a handshake.
//!
//! # Determinism
//!
//! Key material and every nonce generator are seeded ChaCha20 streams. The
//! same seed, suite and sequence of calls produce byte-identical wire output,
//! which makes failures reproducible from the seed alone.
//!
//! # Wire Format
//!
//! The [`wire`] module writes and parses record headers, including the RFC
//! 9146 connection ID form for DTLS.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod endpoint;
pub mod pair;
pub mod seeded;
pub mod wire;

pub use endpoint::{Endpoint, Received};
pub use pair::{ConnectionPair, ConnectionPairBuilder, DEFAULT_SEED};
pub use seeded::SeededNonceGenerator;
pub use wire::{DTLS_HEADER_LEN, RecordHeader, TLS_HEADER_LEN};
