//! Cipher-suite lookup.
//!
//! Maps an IANA cipher-suite id to the record protection it implies. Key
//! exchange and authentication are irrelevant to the record layer and are
//! carried only in the name.

use tlsrec_crypto::{
    AeadAlgorithm::{self, Aes128Ccm, Aes128Ccm8, Aes128Gcm, Aes256Ccm, Aes256Ccm8, Aes256Gcm, ChaCha20Poly1305},
    BlockAlgorithm::{self, Aes128, Aes256},
    HashAlgorithm::{self, Sha1, Sha256, Sha384},
    MacAlgorithm,
};

/// Bulk protection selected by a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkCipher {
    /// No encryption
    Null,
    /// CBC with a separate MAC
    Block(BlockAlgorithm),
    /// Authenticated encryption
    Aead(AeadAlgorithm),
    /// RFC 9150 HMAC-only protection over the given hash
    IntegrityOnly(HashAlgorithm),
}

/// One row of the suite table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite {
    /// IANA identifier
    pub id: u16,
    /// IANA name
    pub name: &'static str,
    /// Record protection
    pub bulk: BulkCipher,
    /// Record MAC ([`MacAlgorithm::Null`] for AEAD and integrity-only suites)
    pub mac: MacAlgorithm,
    /// Hash for the PRF (TLS 1.2) or HKDF (TLS 1.3)
    pub prf_hash: HashAlgorithm,
}

const fn suite(
    id: u16,
    name: &'static str,
    bulk: BulkCipher,
    mac: MacAlgorithm,
    prf_hash: HashAlgorithm,
) -> CipherSuite {
    CipherSuite { id, name, bulk, mac, prf_hash }
}

const NO_MAC: MacAlgorithm = MacAlgorithm::Null;

impl CipherSuite {
    /// `TLS_NULL_WITH_NULL_NULL`, the initial state of every connection.
    pub const NULL_WITH_NULL_NULL: Self =
        suite(0x0000, "TLS_NULL_WITH_NULL_NULL", BulkCipher::Null, NO_MAC, Sha256);

    /// Every suite the record layer can protect.
    pub const ALL: &'static [Self] = &[
        Self::NULL_WITH_NULL_NULL,
        suite(0x0002, "TLS_RSA_WITH_NULL_SHA", BulkCipher::Null, MacAlgorithm::Hmac(Sha1), Sha256),
        suite(0x003B, "TLS_RSA_WITH_NULL_SHA256", BulkCipher::Null, MacAlgorithm::Hmac(Sha256), Sha256),
        suite(0x002F, "TLS_RSA_WITH_AES_128_CBC_SHA", BulkCipher::Block(Aes128), MacAlgorithm::Hmac(Sha1), Sha256),
        suite(0x0035, "TLS_RSA_WITH_AES_256_CBC_SHA", BulkCipher::Block(Aes256), MacAlgorithm::Hmac(Sha1), Sha256),
        suite(
            0x003C,
            "TLS_RSA_WITH_AES_128_CBC_SHA256",
            BulkCipher::Block(Aes128),
            MacAlgorithm::Hmac(Sha256),
            Sha256,
        ),
        suite(
            0x003D,
            "TLS_RSA_WITH_AES_256_CBC_SHA256",
            BulkCipher::Block(Aes256),
            MacAlgorithm::Hmac(Sha256),
            Sha256,
        ),
        suite(
            0xC013,
            "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
            BulkCipher::Block(Aes128),
            MacAlgorithm::Hmac(Sha1),
            Sha256,
        ),
        suite(
            0xC014,
            "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
            BulkCipher::Block(Aes256),
            MacAlgorithm::Hmac(Sha1),
            Sha256,
        ),
        suite(
            0xC027,
            "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256",
            BulkCipher::Block(Aes128),
            MacAlgorithm::Hmac(Sha256),
            Sha256,
        ),
        suite(
            0xC028,
            "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384",
            BulkCipher::Block(Aes256),
            MacAlgorithm::Hmac(Sha384),
            Sha384,
        ),
        suite(0x009C, "TLS_RSA_WITH_AES_128_GCM_SHA256", BulkCipher::Aead(Aes128Gcm), NO_MAC, Sha256),
        suite(0x009D, "TLS_RSA_WITH_AES_256_GCM_SHA384", BulkCipher::Aead(Aes256Gcm), NO_MAC, Sha384),
        suite(0xC02F, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", BulkCipher::Aead(Aes128Gcm), NO_MAC, Sha256),
        suite(0xC030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", BulkCipher::Aead(Aes256Gcm), NO_MAC, Sha384),
        suite(0xC09C, "TLS_RSA_WITH_AES_128_CCM", BulkCipher::Aead(Aes128Ccm), NO_MAC, Sha256),
        suite(0xC09D, "TLS_RSA_WITH_AES_256_CCM", BulkCipher::Aead(Aes256Ccm), NO_MAC, Sha256),
        suite(0xC0A0, "TLS_RSA_WITH_AES_128_CCM_8", BulkCipher::Aead(Aes128Ccm8), NO_MAC, Sha256),
        suite(0xC0A1, "TLS_RSA_WITH_AES_256_CCM_8", BulkCipher::Aead(Aes256Ccm8), NO_MAC, Sha256),
        suite(
            0xCCA8,
            "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
            BulkCipher::Aead(ChaCha20Poly1305),
            NO_MAC,
            Sha256,
        ),
        suite(0x1301, "TLS_AES_128_GCM_SHA256", BulkCipher::Aead(Aes128Gcm), NO_MAC, Sha256),
        suite(0x1302, "TLS_AES_256_GCM_SHA384", BulkCipher::Aead(Aes256Gcm), NO_MAC, Sha384),
        suite(0x1303, "TLS_CHACHA20_POLY1305_SHA256", BulkCipher::Aead(ChaCha20Poly1305), NO_MAC, Sha256),
        suite(0x1304, "TLS_AES_128_CCM_SHA256", BulkCipher::Aead(Aes128Ccm), NO_MAC, Sha256),
        suite(0x1305, "TLS_AES_128_CCM_8_SHA256", BulkCipher::Aead(Aes128Ccm8), NO_MAC, Sha256),
        suite(0xC0B4, "TLS_SHA256_SHA256", BulkCipher::IntegrityOnly(Sha256), NO_MAC, Sha256),
        suite(0xC0B5, "TLS_SHA384_SHA384", BulkCipher::IntegrityOnly(Sha384), NO_MAC, Sha384),
    ];

    /// Look up a suite by IANA id.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.iter().find(|s| s.id == id).copied()
    }

    /// TLS 1.3 suites: 0x13xx and the RFC 9150 integrity-only pair.
    pub fn is_tls13(&self) -> bool {
        self.id >> 8 == 0x13 || matches!(self.bulk, BulkCipher::IntegrityOnly(_))
    }
}

impl std::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:04X})", self.name, self.id)
    }
}
