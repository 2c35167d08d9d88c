//! `chacha20`: the authenticated encryptor.
//!
//! The page key is Argon2id(secretkey, salt = H(name, keyid)). The AAD binds
//! the encryptor name and keyid, so a page sealed under one keyid cannot be
//! opened under another even if the derived keys collided.

use crate::cipher::{self, SealedData, NONCE_SIZE, TAG_SIZE};
use crate::encryptor::{Encryptor, EncryptorFactory};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, DerivedKey, KdfParams, Salt};
use burrow_types::SecretKey;
use std::sync::Arc;

/// Registered name of the authenticated encryptor.
pub const CHACHA20_ENCRYPTOR: &str = "chacha20";

/// Factory for [`ChaChaEncryptor`] instances.
#[derive(Debug, Clone, Default)]
pub struct ChaChaFactory {
    params: KdfParams,
}

impl ChaChaFactory {
    /// Uses custom key derivation parameters.
    pub fn with_params(params: KdfParams) -> Self {
        Self { params }
    }
}

impl EncryptorFactory for ChaChaFactory {
    fn customize(
        &self,
        keyid: &str,
        secretkey: Option<&SecretKey>,
    ) -> CryptoResult<Arc<dyn Encryptor>> {
        if keyid.is_empty() {
            return Err(CryptoError::InvalidKeyId {
                name: CHACHA20_ENCRYPTOR.to_string(),
                reason: "a keyid is required".to_string(),
            });
        }
        let secret = secretkey.map(SecretKey::expose).unwrap_or_default();
        let salt = Salt::for_keyid(CHACHA20_ENCRYPTOR, keyid);
        let key = derive_key(secret.as_bytes(), &salt, &self.params)?;
        Ok(Arc::new(ChaChaEncryptor::new(key, keyid)))
    }
}

/// ChaCha20-Poly1305 page encryptor.
pub struct ChaChaEncryptor {
    key: DerivedKey,
    aad: Vec<u8>,
}

impl ChaChaEncryptor {
    /// Builds an encryptor from an already-derived key.
    pub fn new(key: DerivedKey, keyid: &str) -> Self {
        let mut aad = Vec::with_capacity(CHACHA20_ENCRYPTOR.len() + 1 + keyid.len());
        aad.extend_from_slice(CHACHA20_ENCRYPTOR.as_bytes());
        aad.push(0);
        aad.extend_from_slice(keyid.as_bytes());
        Self { key, aad }
    }
}

impl Encryptor for ChaChaEncryptor {
    fn name(&self) -> &str {
        CHACHA20_ENCRYPTOR
    }

    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(cipher::seal(&self.key, &self.aad, plaintext)?.to_bytes())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let sealed = SealedData::from_bytes(ciphertext)?;
        cipher::open(&self.key, &self.aad, &sealed)
    }

    fn sizing(&self) -> usize {
        NONCE_SIZE + TAG_SIZE
    }
}

impl std::fmt::Debug for ChaChaEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaChaEncryptor")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
