//! Key schedule: legacy PRFs and HKDF-Expand-Label.
//!
//! Two derivation families feed the record ciphers:
//!
//! ```text
//! <= TLS 1.2                            TLS 1.3
//!
//! master_secret                         traffic_secret (per direction)
//!      │                                      │
//!      ▼ PRF("key expansion",                 ▼ HKDF-Expand-Label("key" | "iv")
//!      │     server_random || client_random)  │
//! key_block = client MAC || server MAC       key, iv
//!             || client key || server key
//!             || client IV || server IV
//! ```
//!
//! The legacy PRF is SSLv3's MD5/SHA-1 construction, the TLS 1.0/1.1
//! `P_MD5 xor P_SHA1` split-secret PRF, or TLS 1.2's single `P_hash`.

use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};
use tlsrec_proto::ProtocolVersion;
use zeroize::Zeroizing;

use crate::{
    error::CryptoError,
    hash::{DigestState, HashAlgorithm},
    mac::{MacAlgorithm, TlsHmac},
    secret::Secret,
};

/// Label for the key block (RFC 5246 §6.3)
pub const KEY_EXPANSION_LABEL: &[u8] = b"key expansion";

/// Labels for TLS 1.3 traffic key derivation (RFC 8446 §7.3)
const KEY_LABEL: &[u8] = b"key";
const IV_LABEL: &[u8] = b"iv";

/// Most bytes the SSLv3 key block construction can produce: 26 rounds
/// ("A" .. "ZZ..Z") of 16 bytes.
const SSL3_MAX_OUTPUT: usize = 26 * 16;

/// Pseudo-random function used to expand the master secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrfAlgorithm {
    /// SSLv3 MD5/SHA-1 key block construction
    Ssl3,
    /// TLS 1.0/1.1: `P_MD5(S1) xor P_SHA1(S2)`
    Tls10,
    /// TLS 1.2: `P_hash` with the suite's PRF hash
    Tls12(HashAlgorithm),
    /// TLS 1.3: HKDF with the suite's hash
    Tls13(HashAlgorithm),
}

impl PrfAlgorithm {
    /// PRF used by `version` when the suite names `hash`.
    ///
    /// Versions before TLS 1.2 ignore the suite hash.
    pub fn for_version(version: ProtocolVersion, hash: HashAlgorithm) -> Self {
        if version.is_ssl() {
            Self::Ssl3
        } else if version.is_tls13() {
            Self::Tls13(hash)
        } else if version.is_tls12() {
            Self::Tls12(hash)
        } else {
            Self::Tls10
        }
    }
}

/// `P_hash(secret, seed)` from RFC 5246 §5, filling `out`.
pub fn p_hash(hash: HashAlgorithm, secret: &[u8], seed: &[u8], out: &mut [u8]) -> Result<(), CryptoError> {
    let mut mac = TlsHmac::new(MacAlgorithm::Hmac(hash), secret)?;

    // A(1) = HMAC(secret, seed)
    mac.update(seed);
    let mut a = mac.calculate_mac();

    for chunk in out.chunks_mut(hash.output_len()) {
        mac.update(&a);
        mac.update(seed);
        let block = Zeroizing::new(mac.calculate_mac());
        chunk.copy_from_slice(&block[..chunk.len()]);

        mac.update(&a);
        a = mac.calculate_mac();
    }

    Ok(())
}

/// Labelled PRF: `PRF(secret, label, seed)` truncated to `len` bytes.
///
/// SSLv3 and TLS 1.3 have no labelled PRF; use [`ssl3_key_block`] and
/// [`hkdf_expand_label`] for those.
pub fn prf(
    algorithm: PrfAlgorithm,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);

    let mut out = Zeroizing::new(vec![0u8; len]);
    match algorithm {
        PrfAlgorithm::Tls10 => {
            // S1 and S2 are the two halves of the secret, overlapping by one
            // byte when its length is odd
            let half = secret.len().div_ceil(2);
            let s1 = &secret[..half];
            let s2 = &secret[secret.len() - half..];

            p_hash(HashAlgorithm::Md5, s1, &label_seed, &mut out)?;
            let mut sha = Zeroizing::new(vec![0u8; len]);
            p_hash(HashAlgorithm::Sha1, s2, &label_seed, &mut sha)?;
            for (o, s) in out.iter_mut().zip(sha.iter()) {
                *o ^= s;
            }
        },
        PrfAlgorithm::Tls12(hash) => p_hash(hash, secret, &label_seed, &mut out)?,
        PrfAlgorithm::Ssl3 | PrfAlgorithm::Tls13(_) => {
            return Err(CryptoError::UnsupportedAlgorithm("no labelled PRF for this version"));
        },
    }
    Ok(out)
}

/// SSLv3 key block:
/// `MD5(secret || SHA1("A" || secret || random)) || MD5(secret || SHA1("BB" || ...)) || ...`
pub fn ssl3_key_block(
    master_secret: &[u8],
    random: &[u8],
    len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if len > SSL3_MAX_OUTPUT {
        return Err(CryptoError::InvalidOutputLength { requested: len, max: SSL3_MAX_OUTPUT });
    }

    let mut out = Zeroizing::new(Vec::with_capacity(len.next_multiple_of(16)));
    let mut round = 0u8;
    while out.len() < len {
        let salt = vec![b'A' + round; usize::from(round) + 1];

        let mut sha = DigestState::new(HashAlgorithm::Sha1);
        sha.update(&salt);
        sha.update(master_secret);
        sha.update(random);
        let inner = Zeroizing::new(sha.finalize());

        let mut md5 = DigestState::new(HashAlgorithm::Md5);
        md5.update(master_secret);
        md5.update(&inner);
        out.extend_from_slice(&md5.finalize());

        round += 1;
    }
    out.truncate(len);
    Ok(out)
}

/// Expand the master secret into `len` bytes of key block.
///
/// The seed is `server_random || client_random` for every legacy version.
pub fn calculate_key_block(
    algorithm: PrfAlgorithm,
    master_secret: &Secret,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(server_random);
    seed[32..].copy_from_slice(client_random);

    let key_block = master_secret
        .with_bytes(|secret| match algorithm {
            PrfAlgorithm::Ssl3 => ssl3_key_block(secret, &seed, len),
            _ => prf(algorithm, secret, KEY_EXPANSION_LABEL, &seed, len),
        })
        .and_then(|derived| derived)
        .inspect_err(|err| tracing::debug!(?algorithm, len, %err, "key block derivation failed"))?;

    tracing::trace!(?algorithm, len, "key block derived");
    Ok(key_block)
}

/// Build the `HkdfLabel` structure of RFC 8446 §7.1.
fn hkdf_label(prefix: &[u8], label: &[u8], context: &[u8], len: usize) -> Result<Vec<u8>, CryptoError> {
    let full_label_len = prefix.len() + label.len();
    let (Ok(len_u16), Ok(label_u8), Ok(ctx_u8)) =
        (u16::try_from(len), u8::try_from(full_label_len), u8::try_from(context.len()))
    else {
        return Err(CryptoError::InvalidOutputLength { requested: len, max: usize::from(u16::MAX) });
    };

    // Capacity: 2 (length) + 1 + label + 1 + context
    let mut info = Vec::with_capacity(4 + full_label_len + context.len());
    info.extend_from_slice(&len_u16.to_be_bytes());
    info.push(label_u8);
    info.extend_from_slice(prefix);
    info.extend_from_slice(label);
    info.push(ctx_u8);
    info.extend_from_slice(context);
    Ok(info)
}

/// HKDF-Expand-Label(secret, label, context, len) with the given label
/// prefix (`"tls13 "` or `"dtls13"`).
pub fn hkdf_expand_label(
    hash: HashAlgorithm,
    secret: &[u8],
    prefix: &[u8],
    label: &[u8],
    context: &[u8],
    len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let info = hkdf_label(prefix, label, context, len)?;
    let mut out = Zeroizing::new(vec![0u8; len]);

    let bad_prk = |_| CryptoError::InvalidKeyLength { expected: hash.output_len(), actual: secret.len() };
    let bad_len = |_| CryptoError::InvalidOutputLength { requested: len, max: 255 * hash.output_len() };
    match hash {
        HashAlgorithm::Sha256 => {
            Hkdf::<Sha256>::from_prk(secret).map_err(bad_prk)?.expand(&info, &mut out).map_err(bad_len)?;
        },
        HashAlgorithm::Sha384 => {
            Hkdf::<Sha384>::from_prk(secret).map_err(bad_prk)?.expand(&info, &mut out).map_err(bad_len)?;
        },
        HashAlgorithm::Sha512 => {
            Hkdf::<Sha512>::from_prk(secret).map_err(bad_prk)?.expand(&info, &mut out).map_err(bad_len)?;
        },
        HashAlgorithm::Md5 | HashAlgorithm::Sha1 => {
            return Err(CryptoError::UnsupportedAlgorithm("HKDF requires SHA-2"));
        },
    }
    Ok(out)
}

/// HKDF-Extract(salt, ikm).
pub fn hkdf_extract(hash: HashAlgorithm, salt: &[u8], ikm: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let prk = match hash {
        HashAlgorithm::Sha256 => Hkdf::<Sha256>::extract(Some(salt), ikm).0.to_vec(),
        HashAlgorithm::Sha384 => Hkdf::<Sha384>::extract(Some(salt), ikm).0.to_vec(),
        HashAlgorithm::Sha512 => Hkdf::<Sha512>::extract(Some(salt), ikm).0.to_vec(),
        HashAlgorithm::Md5 | HashAlgorithm::Sha1 => {
            return Err(CryptoError::UnsupportedAlgorithm("HKDF requires SHA-2"));
        },
    };
    Ok(Zeroizing::new(prk))
}

/// Record key and fixed IV derived from a TLS 1.3 traffic secret.
pub struct TrafficKeys {
    /// Bulk (or HMAC) key
    pub key: Zeroizing<Vec<u8>>,
    /// Fixed per-direction IV
    pub iv: Zeroizing<Vec<u8>>,
}

/// Derive `key` and `iv` from `secret` with empty context (RFC 8446 §7.3).
///
/// Called at construction and on every key update; reads whatever the secret
/// holds at the time of the call.
pub fn derive_traffic_keys(
    secret: &Secret,
    hash: HashAlgorithm,
    prefix: &[u8],
    key_len: usize,
    iv_len: usize,
) -> Result<TrafficKeys, CryptoError> {
    let key = secret.hkdf_expand_label(hash, prefix, KEY_LABEL, &[], key_len)?.extract()?;
    let iv = secret.hkdf_expand_label(hash, prefix, IV_LABEL, &[], iv_len)?.extract()?;
    Ok(TrafficKeys { key, iv })
}
