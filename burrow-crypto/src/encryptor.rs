//! The encryptor abstraction every cipher plugs into.
//!
//! The page codec depends on `Arc<dyn Encryptor>` and never sees key
//! material. Instances are immutable once customized and are shared by every
//! reader and writer of a table, so all methods take `&self`.

use crate::error::CryptoResult;
use burrow_types::{SecretKey, NONE_ENCRYPTOR};
use std::sync::Arc;

/// A named, customized cipher instance.
pub trait Encryptor: Send + Sync {
    /// Registered name of the encryptor that produced this instance.
    fn name(&self) -> &str;

    /// Encrypts one page payload.
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypts a payload previously produced by `encrypt` on an instance
    /// with the same key material.
    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Maximum number of bytes `encrypt` adds to its input.
    fn sizing(&self) -> usize;

    /// True only for the `none` pass-through.
    fn is_identity(&self) -> bool {
        false
    }
}

/// Builds customized [`Encryptor`] instances for one registered name.
pub trait EncryptorFactory: Send + Sync {
    /// Derives an instance for `keyid` and an optional secret.
    ///
    /// Must be deterministic: the same inputs must yield an instance that can
    /// decrypt what any earlier instance with those inputs encrypted.
    fn customize(
        &self,
        keyid: &str,
        secretkey: Option<&SecretKey>,
    ) -> CryptoResult<Arc<dyn Encryptor>>;
}

/// Identity encryptor used for tables without encryption.
/// Data passes through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneEncryptor;

impl Encryptor for NoneEncryptor {
    fn name(&self) -> &str {
        NONE_ENCRYPTOR
    }

    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }

    fn sizing(&self) -> usize {
        0
    }

    fn is_identity(&self) -> bool {
        true
    }
}
