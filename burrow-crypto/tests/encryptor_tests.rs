use burrow_crypto::{Encryptor, EncryptorFactory, NoneEncryptor, RotnFactory, ROTN_HEADER};
use burrow_types::SecretKey;
use std::sync::Arc;

// ── NoneEncryptor ───────────────────────────────────────────────

#[test]
fn none_is_identity() {
    let enc = NoneEncryptor;
    assert!(enc.is_identity());
    assert_eq!(enc.name(), "none");
    assert_eq!(enc.sizing(), 0);
}

#[test]
fn none_encrypt_returns_same_data() {
    let enc = NoneEncryptor;
    assert_eq!(enc.encrypt(b"hello world").unwrap(), b"hello world");
}

#[test]
fn none_decrypt_returns_same_data() {
    let enc = NoneEncryptor;
    assert_eq!(enc.decrypt(b"hello world").unwrap(), b"hello world");
}

#[test]
fn none_empty_data() {
    let enc = NoneEncryptor;
    assert!(enc.encrypt(b"").unwrap().is_empty());
    assert!(enc.decrypt(b"").unwrap().is_empty());
}

#[test]
fn none_large_data() {
    let enc = NoneEncryptor;
    let data: Vec<u8> = (0..100_000).map(|i| (i % 256) as u8).collect();
    let encrypted = enc.encrypt(&data).unwrap();
    assert_eq!(encrypted, data);
    assert_eq!(enc.decrypt(&encrypted).unwrap(), data);
}

// ── rotn through the trait ──────────────────────────────────────

#[test]
fn rotn_sizing_matches_output_growth() {
    let enc = RotnFactory.customize("11", None).unwrap();
    let out = enc.encrypt(b"abcdef").unwrap();
    assert_eq!(out.len(), 6 + enc.sizing());
    assert_eq!(enc.sizing(), ROTN_HEADER.len());
    assert!(!enc.is_identity());
}

#[test]
fn rotn_distinct_secrets_do_not_interoperate() {
    let abc = SecretKey::new("ABC");
    let xyz = SecretKey::new("XYZ");
    let a = RotnFactory.customize("11", Some(&abc)).unwrap();
    let b = RotnFactory.customize("11", Some(&xyz)).unwrap();
    let ct = a.encrypt(b"the quick brown fox").unwrap();
    assert_ne!(b.decrypt(&ct).unwrap(), b"the quick brown fox");
    assert_eq!(a.decrypt(&ct).unwrap(), b"the quick brown fox");
}

// ── Encryptor as trait object ───────────────────────────────────

#[test]
fn encryptors_as_dyn_trait() {
    let encs: Vec<Arc<dyn Encryptor>> = vec![
        Arc::new(NoneEncryptor),
        RotnFactory.customize("3", None).unwrap(),
    ];
    for enc in encs {
        let ct = enc.encrypt(b"trait object test").unwrap();
        assert_eq!(enc.decrypt(&ct).unwrap(), b"trait object test");
    }
}

#[test]
fn instances_are_shareable_across_threads() {
    let enc = RotnFactory.customize("7", None).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let enc = Arc::clone(&enc);
            std::thread::spawn(move || {
                let data = format!("payload number {i}").into_bytes();
                let ct = enc.encrypt(&data).unwrap();
                assert_eq!(enc.decrypt(&ct).unwrap(), data);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}
