//! Negotiated parameters and the crypto context record ciphers are built from.
//!
//! The handshake fills a [`SecurityParameters`] through its builder and wraps
//! it, together with the connection end and a randomness source, in a
//! [`CryptoContext`]. Encoder and decoder of one connection share the context
//! through an `Arc`; the only state that changes after construction is the
//! pair of TLS 1.3 traffic secrets, which key updates replace.

#![allow(clippy::disallowed_types, reason = "traffic secret slots are guarded by a short synchronous lock")]

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tlsrec_crypto::{CryptoError, HashAlgorithm, NonceGenerator, PrfAlgorithm, Secret};
use tlsrec_proto::{ConnectionEnd, ProtocolVersion};

/// Label for the TLS 1.3 traffic secret update (RFC 8446 §7.2)
const TRAFFIC_UPDATE_LABEL: &[u8] = b"traffic upd";

/// Parameters negotiated by the handshake.
pub struct SecurityParameters {
    negotiated_version: ProtocolVersion,
    prf_hash: HashAlgorithm,
    master_secret: Option<Secret>,
    client_random: [u8; 32],
    server_random: [u8; 32],
    traffic_secret_client: Mutex<Option<Secret>>,
    traffic_secret_server: Mutex<Option<Secret>>,
    connection_id_local: Vec<u8>,
    connection_id_peer: Vec<u8>,
    truncated_hmac: bool,
    encrypt_then_mac: bool,
    extended_padding: bool,
}

impl SecurityParameters {
    /// Start building parameters for `version`.
    pub fn builder(version: ProtocolVersion) -> SecurityParametersBuilder {
        SecurityParametersBuilder {
            params: Self {
                negotiated_version: version,
                prf_hash: HashAlgorithm::Sha256,
                master_secret: None,
                client_random: [0; 32],
                server_random: [0; 32],
                traffic_secret_client: Mutex::new(None),
                traffic_secret_server: Mutex::new(None),
                connection_id_local: Vec::new(),
                connection_id_peer: Vec::new(),
                truncated_hmac: false,
                encrypt_then_mac: false,
                extended_padding: false,
            },
        }
    }

    /// Negotiated protocol version; also the version written into MAC headers.
    pub fn negotiated_version(&self) -> ProtocolVersion {
        self.negotiated_version
    }

    /// Hash named by the cipher suite for the PRF / HKDF.
    pub fn prf_hash(&self) -> HashAlgorithm {
        self.prf_hash
    }

    /// PRF implied by version and suite hash.
    pub fn prf_algorithm(&self) -> PrfAlgorithm {
        PrfAlgorithm::for_version(self.negotiated_version, self.prf_hash)
    }

    /// Master secret (versions before TLS 1.3).
    pub fn master_secret(&self) -> Option<&Secret> {
        self.master_secret.as_ref()
    }

    /// `ClientHello.random`
    pub fn client_random(&self) -> &[u8; 32] {
        &self.client_random
    }

    /// `ServerHello.random`
    pub fn server_random(&self) -> &[u8; 32] {
        &self.server_random
    }

    /// Connection ID the peer puts on records it sends us.
    pub fn connection_id_local(&self) -> &[u8] {
        &self.connection_id_local
    }

    /// Connection ID we put on records we send.
    pub fn connection_id_peer(&self) -> &[u8] {
        &self.connection_id_peer
    }

    /// Truncated HMAC (RFC 6066 §7) negotiated.
    pub fn truncated_hmac(&self) -> bool {
        self.truncated_hmac
    }

    /// Encrypt-then-MAC (RFC 7366) negotiated.
    pub fn encrypt_then_mac(&self) -> bool {
        self.encrypt_then_mac
    }

    /// Variable-length CBC padding negotiated.
    pub fn extended_padding(&self) -> bool {
        self.extended_padding
    }

    fn traffic_slot(&self, end: ConnectionEnd) -> &Mutex<Option<Secret>> {
        match end {
            ConnectionEnd::Client => &self.traffic_secret_client,
            ConnectionEnd::Server => &self.traffic_secret_server,
        }
    }

    /// Run `f` over the current traffic secret of `end`.
    ///
    /// Returns `None` when no secret is installed.
    pub fn with_traffic_secret<R>(&self, end: ConnectionEnd, f: impl FnOnce(&Secret) -> R) -> Option<R> {
        let slot = self.traffic_slot(end).lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(f)
    }

    /// Install a new traffic secret for `end`, destroying the previous one.
    pub fn set_traffic_secret(&self, end: ConnectionEnd, secret: Secret) {
        let mut slot = self.traffic_slot(end).lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slot.replace(secret) {
            old.destroy();
        }
    }

    /// Advance the traffic secret of `end` one generation:
    /// `HKDF-Expand-Label(secret, "traffic upd", "", Hash.length)`.
    ///
    /// Ciphers keep their old keys until rekeyed.
    pub fn update_traffic_secret(&self, end: ConnectionEnd) -> Result<(), CryptoError> {
        let hash = self.prf_hash;
        let prefix = self.negotiated_version.hkdf_label_prefix();
        let next = self
            .with_traffic_secret(end, |s| {
                s.hkdf_expand_label(hash, prefix, TRAFFIC_UPDATE_LABEL, &[], hash.output_len())
            })
            .ok_or(CryptoError::DeadSecret)??;
        self.set_traffic_secret(end, next);
        Ok(())
    }
}

impl fmt::Debug for SecurityParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityParameters")
            .field("negotiated_version", &self.negotiated_version)
            .field("prf_hash", &self.prf_hash)
            .field("connection_id_local", &self.connection_id_local)
            .field("connection_id_peer", &self.connection_id_peer)
            .field("truncated_hmac", &self.truncated_hmac)
            .field("encrypt_then_mac", &self.encrypt_then_mac)
            .field("extended_padding", &self.extended_padding)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SecurityParameters`].
#[derive(Debug)]
pub struct SecurityParametersBuilder {
    params: SecurityParameters,
}

impl SecurityParametersBuilder {
    /// Hash for the PRF (TLS 1.2) or HKDF (TLS 1.3). Defaults to SHA-256.
    #[must_use]
    pub fn prf_hash(mut self, hash: HashAlgorithm) -> Self {
        self.params.prf_hash = hash;
        self
    }

    /// Master secret and hello randoms for legacy key block derivation.
    #[must_use]
    pub fn master_secret(mut self, secret: Secret, client_random: [u8; 32], server_random: [u8; 32]) -> Self {
        self.params.master_secret = Some(secret);
        self.params.client_random = client_random;
        self.params.server_random = server_random;
        self
    }

    /// Initial TLS 1.3 application traffic secrets.
    #[must_use]
    pub fn traffic_secrets(self, client: Secret, server: Secret) -> Self {
        self.params.set_traffic_secret(ConnectionEnd::Client, client);
        self.params.set_traffic_secret(ConnectionEnd::Server, server);
        self
    }

    /// Connection IDs (RFC 9146): `local` is what the peer sends to us, `peer`
    /// what we send.
    #[must_use]
    pub fn connection_ids(mut self, local: impl Into<Vec<u8>>, peer: impl Into<Vec<u8>>) -> Self {
        self.params.connection_id_local = local.into();
        self.params.connection_id_peer = peer.into();
        self
    }

    /// Negotiate truncated HMAC.
    #[must_use]
    pub fn truncated_hmac(mut self, enabled: bool) -> Self {
        self.params.truncated_hmac = enabled;
        self
    }

    /// Negotiate encrypt-then-MAC.
    #[must_use]
    pub fn encrypt_then_mac(mut self, enabled: bool) -> Self {
        self.params.encrypt_then_mac = enabled;
        self
    }

    /// Allow extra CBC padding blocks.
    #[must_use]
    pub fn extended_padding(mut self, enabled: bool) -> Self {
        self.params.extended_padding = enabled;
        self
    }

    /// Finish.
    pub fn build(self) -> SecurityParameters {
        self.params
    }
}

/// Everything a record cipher needs from its connection.
pub struct CryptoContext {
    entity: ConnectionEnd,
    params: SecurityParameters,
    nonce_generator: Arc<dyn NonceGenerator>,
}

impl CryptoContext {
    /// Bundle a role, negotiated parameters and a randomness source.
    pub fn new(entity: ConnectionEnd, params: SecurityParameters, nonce_generator: Arc<dyn NonceGenerator>) -> Self {
        Self { entity, params, nonce_generator }
    }

    /// Which end of the connection we are.
    pub fn entity(&self) -> ConnectionEnd {
        self.entity
    }

    /// Whether we are the server.
    pub fn is_server(&self) -> bool {
        self.entity.is_server()
    }

    /// Negotiated parameters.
    pub fn security_parameters(&self) -> &SecurityParameters {
        &self.params
    }

    /// Shorthand for the negotiated version.
    pub fn version(&self) -> ProtocolVersion {
        self.params.negotiated_version
    }

    /// Randomness source for IVs, padding and timing masks.
    pub fn nonce_generator(&self) -> &dyn NonceGenerator {
        self.nonce_generator.as_ref()
    }
}

impl fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoContext")
            .field("entity", &self.entity)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Split a key block into its consecutive parts.
///
/// Returns `None` if the block is shorter than the sum of `lens`.
pub(crate) fn split_key_block<'a, const N: usize>(block: &'a [u8], lens: [usize; N]) -> Option<[&'a [u8]; N]> {
    let mut parts = [&block[..0]; N];
    let mut rest = block;
    for (part, len) in parts.iter_mut().zip(lens) {
        let (head, tail) = rest.split_at_checked(len)?;
        *part = head;
        rest = tail;
    }
    Some(parts)
}
