//! A client and server with matching key material.
//!
//! Stands in for a completed handshake: both ends get the same master secret
//! and hello randoms (TLS 1.2 and earlier) or the same pair of application
//! traffic secrets (TLS 1.3), all drawn from one seed.

use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tlsrec_crypto::{HashAlgorithm, Secret};
use tlsrec_proto::{ConnectionEnd, ContentType, ProtocolVersion};
use tlsrec_record::{CipherSuite, CryptoContext, RecordError, RecordProtection, SecurityParameters};

use crate::{
    endpoint::{Endpoint, Received},
    seeded::SeededNonceGenerator,
};

const CLIENT_TRAFFIC_LABEL: &[u8] = b"c ap traffic";
const SERVER_TRAFFIC_LABEL: &[u8] = b"s ap traffic";

/// Seed used when the builder is not given one.
pub const DEFAULT_SEED: u64 = 0x7e57_5eed;

/// Key material both ends derive their contexts from.
struct SharedKeys {
    master_secret: [u8; 48],
    client_random: [u8; 32],
    server_random: [u8; 32],
    handshake_ikm: Vec<u8>,
}

impl SharedKeys {
    fn generate(seed: u64, hash: HashAlgorithm) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut keys = Self {
            master_secret: [0; 48],
            client_random: [0; 32],
            server_random: [0; 32],
            handshake_ikm: vec![0; hash.output_len()],
        };
        rng.fill_bytes(&mut keys.master_secret);
        rng.fill_bytes(&mut keys.client_random);
        rng.fill_bytes(&mut keys.server_random);
        rng.fill_bytes(&mut keys.handshake_ikm);
        keys
    }

    /// Client and server application traffic secrets, freshly derived so each
    /// end owns its own copies.
    fn traffic_secrets(&self, hash: HashAlgorithm, prefix: &[u8]) -> Result<(Secret, Secret), RecordError> {
        let len = hash.output_len();
        let master = Secret::new(vec![0; len]).hkdf_extract(hash, &self.handshake_ikm)?;
        let client = master.hkdf_expand_label(hash, prefix, CLIENT_TRAFFIC_LABEL, &[], len)?;
        let server = master.hkdf_expand_label(hash, prefix, SERVER_TRAFFIC_LABEL, &[], len)?;
        Ok((client, server))
    }
}

/// Builder for [`ConnectionPair`].
#[derive(Debug, Clone)]
pub struct ConnectionPairBuilder {
    suite: CipherSuite,
    version: ProtocolVersion,
    seed: u64,
    truncated_hmac: bool,
    encrypt_then_mac: bool,
    extended_padding: bool,
    client_cid: Vec<u8>,
    server_cid: Vec<u8>,
}

impl ConnectionPairBuilder {
    /// Seed for key material and both nonce generators.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Negotiate truncated HMAC on both ends.
    #[must_use]
    pub fn truncated_hmac(mut self, enabled: bool) -> Self {
        self.truncated_hmac = enabled;
        self
    }

    /// Negotiate encrypt-then-MAC on both ends.
    #[must_use]
    pub fn encrypt_then_mac(mut self, enabled: bool) -> Self {
        self.encrypt_then_mac = enabled;
        self
    }

    /// Allow extra CBC padding on both ends.
    #[must_use]
    pub fn extended_padding(mut self, enabled: bool) -> Self {
        self.extended_padding = enabled;
        self
    }

    /// Connection IDs: `client_cid` is what the server puts in records sent
    /// to the client, `server_cid` the reverse.
    #[must_use]
    pub fn connection_ids(mut self, client_cid: impl Into<Vec<u8>>, server_cid: impl Into<Vec<u8>>) -> Self {
        self.client_cid = client_cid.into();
        self.server_cid = server_cid.into();
        self
    }

    /// Derive both contexts and build the record protection for each end.
    pub fn build(self) -> Result<ConnectionPair, RecordError> {
        let hash = self.suite.prf_hash;
        let keys = SharedKeys::generate(self.seed, hash);

        let client = self.endpoint(ConnectionEnd::Client, &keys, self.seed.wrapping_add(1))?;
        let server = self.endpoint(ConnectionEnd::Server, &keys, self.seed.wrapping_add(2))?;

        tracing::debug!(suite = %self.suite, version = %self.version, seed = self.seed, "connection pair ready");

        Ok(ConnectionPair { suite: self.suite, version: self.version, client, server })
    }

    fn endpoint(&self, end: ConnectionEnd, keys: &SharedKeys, nonce_seed: u64) -> Result<Endpoint, RecordError> {
        let hash = self.suite.prf_hash;
        let (local_cid, peer_cid) = match end {
            ConnectionEnd::Client => (&self.client_cid, &self.server_cid),
            ConnectionEnd::Server => (&self.server_cid, &self.client_cid),
        };

        let builder = SecurityParameters::builder(self.version)
            .prf_hash(hash)
            .truncated_hmac(self.truncated_hmac)
            .encrypt_then_mac(self.encrypt_then_mac)
            .extended_padding(self.extended_padding)
            .connection_ids(local_cid.clone(), peer_cid.clone());

        let builder = if self.version.is_tls13() {
            let (client, server) = keys.traffic_secrets(hash, self.version.hkdf_label_prefix())?;
            builder.traffic_secrets(client, server)
        } else {
            builder.master_secret(Secret::new(keys.master_secret.to_vec()), keys.client_random, keys.server_random)
        };

        let ctx = Arc::new(CryptoContext::new(end, builder.build(), Arc::new(SeededNonceGenerator::new(nonce_seed))));
        let protection = RecordProtection::for_suite(Arc::clone(&ctx), &self.suite)?;
        Ok(Endpoint::new(ctx, protection))
    }
}

/// Client and server endpoints sharing one negotiated suite.
#[derive(Debug)]
pub struct ConnectionPair {
    suite: CipherSuite,
    version: ProtocolVersion,
    client: Endpoint,
    server: Endpoint,
}

impl ConnectionPair {
    /// Start building a pair for `suite` at `version`.
    pub fn builder(suite: CipherSuite, version: ProtocolVersion) -> ConnectionPairBuilder {
        ConnectionPairBuilder {
            suite,
            version,
            seed: DEFAULT_SEED,
            truncated_hmac: false,
            encrypt_then_mac: false,
            extended_padding: false,
            client_cid: Vec::new(),
            server_cid: Vec::new(),
        }
    }

    /// Negotiated suite.
    pub fn suite(&self) -> &CipherSuite {
        &self.suite
    }

    /// Negotiated version.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// The client end.
    pub fn client(&self) -> &Endpoint {
        &self.client
    }

    /// The client end, mutably.
    pub fn client_mut(&mut self) -> &mut Endpoint {
        &mut self.client
    }

    /// The server end.
    pub fn server(&self) -> &Endpoint {
        &self.server
    }

    /// The server end, mutably.
    pub fn server_mut(&mut self) -> &mut Endpoint {
        &mut self.server
    }

    /// Send one record from client to server.
    pub fn send_client_to_server(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Received, RecordError> {
        let mut wire = self.client.send(content_type, plaintext)?;
        self.server.receive(&mut wire)
    }

    /// Send one record from server to client.
    pub fn send_server_to_client(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Received, RecordError> {
        let mut wire = self.server.send(content_type, plaintext)?;
        self.client.receive(&mut wire)
    }

    /// TLS 1.3 key update for client-to-server traffic.
    ///
    /// Both ends advance the client traffic secret with "traffic upd"; the
    /// client rekeys its encoder and the server its decoder.
    pub fn update_client_traffic_secret(&mut self) -> Result<(), RecordError> {
        self.client.update_write_keys()?;
        self.server.update_read_keys()
    }

    /// TLS 1.3 key update for server-to-client traffic.
    pub fn update_server_traffic_secret(&mut self) -> Result<(), RecordError> {
        self.server.update_write_keys()?;
        self.client.update_read_keys()
    }
}
