//! Cryptographic building blocks for TLS record protection.
//!
//! Everything below the record cipher contract lives here: single-use
//! secrets, the key schedule, keyed MACs and the bulk engines. The record
//! ciphers in `tlsrec-record` compose these; nothing in this crate knows about
//! record layouts.
//!
//! # Key Lifecycle
//!
//! ```text
//! <= TLS 1.2                        TLS 1.3
//!
//! master_secret (Secret)            traffic_secret (Secret, per direction)
//!        │                                 │
//!        ▼                                 ▼
//! PRF("key expansion") → key block  HKDF-Expand-Label("key" | "iv")
//!        │                                 │
//!        ▼                                 ▼
//! MAC keys, bulk keys, IVs          AEAD or HMAC key, fixed IV
//!        │                                 │
//!        └───────────────┬─────────────────┘
//!                        ▼
//!         CbcCipher / AeadEngine / TlsHmac
//! ```
//!
//! On key update the traffic secret is replaced and the second half of the
//! right-hand chain runs again; nonce state is overwritten in place.
//!
//! # Security
//!
//! - Secret material is held in `Zeroizing` buffers and wiped on drop
//! - [`Secret`] hands out its bytes exactly once
//! - Tag comparisons belong to the record layer, which uses constant-time
//!   equality; engines here only report pass or fail
//! - Randomness comes through [`NonceGenerator`] so tests can replay it

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod cbc;
pub mod error;
pub mod hash;
pub mod key_schedule;
pub mod mac;
pub mod random;
pub mod secret;

pub use aead::{AEAD_NONCE_LEN, AeadAlgorithm, AeadEngine, AeadFamily};
pub use cbc::{AES_BLOCK_SIZE, BlockAlgorithm, CbcCipher};
pub use error::CryptoError;
pub use hash::{DigestState, HashAlgorithm};
pub use key_schedule::{PrfAlgorithm, TrafficKeys};
pub use mac::{MacAlgorithm, TlsHmac};
pub use random::{NonceGenerator, OsNonceGenerator};
pub use secret::Secret;
