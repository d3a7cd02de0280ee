//! Property-based tests for the key schedule
//!
//! Key blocks are sliced by the record ciphers into MAC keys, bulk keys and
//! IVs, so a longer request must only ever append bytes to a shorter one.

use proptest::prelude::*;
use tlsrec_crypto::{HashAlgorithm, PrfAlgorithm, Secret, key_schedule};

fn arbitrary_prf() -> impl Strategy<Value = PrfAlgorithm> {
    prop_oneof![
        Just(PrfAlgorithm::Ssl3),
        Just(PrfAlgorithm::Tls10),
        Just(PrfAlgorithm::Tls12(HashAlgorithm::Sha256)),
        Just(PrfAlgorithm::Tls12(HashAlgorithm::Sha384)),
    ]
}

#[test]
fn prop_key_block_is_prefix_stable() {
    proptest!(|(
        prf in arbitrary_prf(),
        master in prop::collection::vec(any::<u8>(), 48),
        client_random in any::<[u8; 32]>(),
        server_random in any::<[u8; 32]>(),
        short in 0usize..200,
        extra in 0usize..200,
    )| {
        let master = Secret::new(master);
        let a = key_schedule::calculate_key_block(prf, &master, &client_random, &server_random, short)
            .expect("key block");
        let b = key_schedule::calculate_key_block(prf, &master, &client_random, &server_random, short + extra)
            .expect("key block");

        // PROPERTY: exact length, and the shorter block is a prefix of the longer
        prop_assert_eq!(a.len(), short);
        prop_assert_eq!(b.len(), short + extra);
        prop_assert_eq!(&b[..short], &a[..]);
        prop_assert!(master.is_alive());
    });
}

#[test]
fn prop_key_block_depends_on_random_order() {
    proptest!(|(
        prf in arbitrary_prf(),
        client_random in any::<[u8; 32]>(),
        server_random in any::<[u8; 32]>(),
    )| {
        prop_assume!(client_random != server_random);
        let master = Secret::new(vec![0x5a; 48]);

        let forward = key_schedule::calculate_key_block(prf, &master, &client_random, &server_random, 64)
            .expect("key block");
        let swapped = key_schedule::calculate_key_block(prf, &master, &server_random, &client_random, 64)
            .expect("key block");

        // INVARIANT: the seed is server_random || client_random, never symmetric
        prop_assert_ne!(&forward[..], &swapped[..]);
    });
}

#[test]
fn prop_traffic_keys_have_requested_lengths() {
    proptest!(|(
        hash in prop_oneof![Just(HashAlgorithm::Sha256), Just(HashAlgorithm::Sha384)],
        key_len in 1usize..64,
        iv_len in 1usize..64,
    )| {
        let secret = Secret::new(vec![0x21; hash.output_len()]);
        let keys = key_schedule::derive_traffic_keys(&secret, hash, b"tls13 ", key_len, iv_len)
            .expect("traffic keys");
        prop_assert_eq!(keys.key.len(), key_len);
        prop_assert_eq!(keys.iv.len(), iv_len);
    });
}
