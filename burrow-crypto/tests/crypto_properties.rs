//! Property-based tests for the encryptors.
//!
//! These verify properties that must hold for every instance:
//! - decrypt(encrypt(p)) == p
//! - output never grows by more than the declared sizing
//! - the authenticated encryptor rejects wrong secrets and tampering

use burrow_crypto::{ChaChaFactory, Encryptor, EncryptorFactory, KdfParams, RotnFactory};
use burrow_types::SecretKey;
use proptest::prelude::*;
use std::sync::{Arc, OnceLock};

fn plaintext_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

fn secret_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-zA-Z]{1,12}")
}

/// Key derivation is slow; derive the chacha20 instances once.
fn chacha_pair() -> &'static (Arc<dyn Encryptor>, Arc<dyn Encryptor>) {
    static PAIR: OnceLock<(Arc<dyn Encryptor>, Arc<dyn Encryptor>)> = OnceLock::new();
    PAIR.get_or_init(|| {
        let factory = ChaChaFactory::with_params(KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        });
        let abc = SecretKey::new("ABC");
        let xyz = SecretKey::new("XYZ");
        (
            factory.customize("11", Some(&abc)).unwrap(),
            factory.customize("11", Some(&xyz)).unwrap(),
        )
    })
}

proptest! {
    #[test]
    fn rotn_roundtrip(
        plaintext in plaintext_strategy(),
        rotation in 0u8..26,
        secret in secret_strategy(),
    ) {
        let secret = secret.map(SecretKey::new);
        let enc = RotnFactory.customize(&rotation.to_string(), secret.as_ref()).unwrap();
        let ct = enc.encrypt(&plaintext).unwrap();
        prop_assert!(ct.len() <= plaintext.len() + enc.sizing());
        prop_assert_eq!(enc.decrypt(&ct).unwrap(), plaintext);
    }

    #[test]
    fn rotn_preserves_non_letters(plaintext in prop::collection::vec(0u8..b'A', 0..512)) {
        let enc = RotnFactory.customize("11", None).unwrap();
        let ct = enc.encrypt(&plaintext).unwrap();
        prop_assert_eq!(&ct[enc.sizing()..], plaintext.as_slice());
    }

    #[test]
    fn chacha_roundtrip(plaintext in plaintext_strategy()) {
        let (enc, _) = chacha_pair();
        let ct = enc.encrypt(&plaintext).unwrap();
        prop_assert_eq!(ct.len(), plaintext.len() + enc.sizing());
        prop_assert_eq!(enc.decrypt(&ct).unwrap(), plaintext);
    }

    #[test]
    fn chacha_wrong_secret_always_fails(plaintext in plaintext_strategy()) {
        let (enc, other) = chacha_pair();
        let ct = enc.encrypt(&plaintext).unwrap();
        prop_assert!(other.decrypt(&ct).is_err());
    }

    #[test]
    fn chacha_tampering_fails(
        plaintext in plaintext_strategy(),
        pos in any::<usize>(),
        flip in 1u8..=255,
    ) {
        let (enc, _) = chacha_pair();
        let mut ct = enc.encrypt(&plaintext).unwrap();
        let pos = pos % ct.len();
        ct[pos] ^= flip;
        prop_assert!(enc.decrypt(&ct).is_err());
    }
}
