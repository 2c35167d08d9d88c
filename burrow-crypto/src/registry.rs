//! Name -> factory registry with a cache of customized instances.
//!
//! A registry belongs to one connection; there is no process-wide registry,
//! so independent engines in one process never see each other's encryptors.
//!
//! Instances are cached by (name, keyid, SHA-256 of the secret). Every cache
//! slot has its own lock: concurrent first use of one tuple builds exactly
//! one instance, while different tuples are customized in parallel.

use crate::encryptor::{Encryptor, EncryptorFactory, NoneEncryptor};
use crate::error::{CryptoError, CryptoResult};
use burrow_types::{EncryptionConfig, EncryptionDescriptor, SecretKey, NONE_ENCRYPTOR};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstanceKey {
    name: String,
    keyid: String,
    secret_digest: [u8; 32],
}

impl InstanceKey {
    fn new(name: &str, keyid: &str, secretkey: Option<&SecretKey>) -> Self {
        let mut secret_digest = [0u8; 32];
        if let Some(secret) = secretkey.filter(|s| !s.is_empty()) {
            secret_digest.copy_from_slice(&Sha256::digest(secret.expose().as_bytes()));
        }
        Self {
            name: name.to_string(),
            keyid: keyid.to_string(),
            secret_digest,
        }
    }
}

type Slot = Arc<Mutex<Option<Arc<dyn Encryptor>>>>;

/// Registry of encryptor factories and resolved instances.
pub struct EncryptorRegistry {
    factories: RwLock<HashMap<String, Arc<dyn EncryptorFactory>>>,
    instances: Mutex<HashMap<InstanceKey, Slot>>,
    identity: Arc<dyn Encryptor>,
}

impl Default for EncryptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptorRegistry {
    /// Creates a registry that knows only `none`.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            identity: Arc::new(NoneEncryptor),
        }
    }

    /// Registers a factory under `name`.
    pub fn register(
        &self,
        name: &str,
        factory: Arc<dyn EncryptorFactory>,
    ) -> CryptoResult<()> {
        if name.is_empty() || name == NONE_ENCRYPTOR {
            return Err(CryptoError::DuplicateName(name.to_string()));
        }
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        if factories.contains_key(name) {
            return Err(CryptoError::DuplicateName(name.to_string()));
        }
        factories.insert(name.to_string(), factory);
        info!(encryptor = %name, "Encryptor registered");
        Ok(())
    }

    /// True if `name` is `none` or has a registered factory.
    pub fn contains(&self, name: &str) -> bool {
        name == NONE_ENCRYPTOR
            || self
                .factories
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .contains_key(name)
    }

    /// Registered names, sorted. `none` is implicit and not listed.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// The shared `none` instance.
    pub fn identity(&self) -> Arc<dyn Encryptor> {
        Arc::clone(&self.identity)
    }

    /// Resolves (name, keyid, secretkey) to a customized instance.
    ///
    /// `none` ignores keyid and secretkey. Repeated calls with the same
    /// tuple return the same `Arc`.
    pub fn resolve(
        &self,
        name: &str,
        keyid: &str,
        secretkey: Option<&SecretKey>,
    ) -> CryptoResult<Arc<dyn Encryptor>> {
        if name.is_empty() || name == NONE_ENCRYPTOR {
            return Ok(self.identity());
        }

        let factory = self
            .factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| CryptoError::UnknownEncryptor(name.to_string()))?;

        let key = InstanceKey::new(name, keyid, secretkey);
        let slot: Slot = {
            let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(instances.entry(key).or_default())
        };

        let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }
        let instance = factory.customize(keyid, secretkey)?;
        debug!(encryptor = %name, keyid = %keyid, "Encryptor instance customized");
        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }

    /// Resolves a requested connection configuration.
    pub fn resolve_config(&self, config: &EncryptionConfig) -> CryptoResult<Arc<dyn Encryptor>> {
        self.resolve(config.name(), config.keyid(), config.secretkey())
    }

    /// Resolves a persisted descriptor with a secret supplied at open.
    pub fn resolve_descriptor(
        &self,
        descriptor: &EncryptionDescriptor,
        secretkey: Option<&SecretKey>,
    ) -> CryptoResult<Arc<dyn Encryptor>> {
        self.resolve(descriptor.name(), descriptor.keyid(), secretkey)
    }

    /// Number of customized instances held in the cache.
    pub fn cached_instances(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|slot| slot.lock().map(|s| s.is_some()).unwrap_or(false))
            .count()
    }
}

impl std::fmt::Debug for EncryptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptorRegistry")
            .field("encryptors", &self.names())
            .field("cached_instances", &self.cached_instances())
            .finish()
    }
}
