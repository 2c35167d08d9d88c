//! Encryptor extensions and the catalog that locates them.
//!
//! Connections name extensions by location in their `extensions=[...]`
//! option. Instead of opening shared libraries, each location is looked up in
//! an [`ExtensionCatalog`] of in-process extensions. A location matches an
//! exact catalog entry, or a library path whose file stem is
//! `libburrow_<entry>` (e.g. `ext/encryptors/rotn/libburrow_rotn.so`).

use crate::chacha::{ChaChaFactory, CHACHA20_ENCRYPTOR};
use crate::error::{CryptoError, CryptoResult};
use crate::key::KdfParams;
use crate::registry::EncryptorRegistry;
use crate::rotn::{RotnFactory, ROTN_ENCRYPTOR};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const LIBRARY_PREFIX: &str = "libburrow_";

/// A loadable unit that registers one or more encryptor factories.
pub trait EncryptorExtension: Send + Sync {
    /// Catalog name of the extension.
    fn name(&self) -> &str;

    /// Registers this extension's factories.
    fn load(&self, registry: &EncryptorRegistry) -> CryptoResult<()>;
}

/// Provides the `rotn` reference cipher.
#[derive(Debug, Default, Clone, Copy)]
pub struct RotnExtension;

impl EncryptorExtension for RotnExtension {
    fn name(&self) -> &str {
        ROTN_ENCRYPTOR
    }

    fn load(&self, registry: &EncryptorRegistry) -> CryptoResult<()> {
        registry.register(ROTN_ENCRYPTOR, Arc::new(RotnFactory))
    }
}

/// Provides the `chacha20` authenticated encryptor.
#[derive(Debug, Default, Clone)]
pub struct ChaChaExtension {
    params: KdfParams,
}

impl ChaChaExtension {
    /// Uses custom key derivation parameters for every instance.
    pub fn with_params(params: KdfParams) -> Self {
        Self { params }
    }
}

impl EncryptorExtension for ChaChaExtension {
    fn name(&self) -> &str {
        CHACHA20_ENCRYPTOR
    }

    fn load(&self, registry: &EncryptorRegistry) -> CryptoResult<()> {
        registry.register(
            CHACHA20_ENCRYPTOR,
            Arc::new(ChaChaFactory::with_params(self.params.clone())),
        )
    }
}

/// Maps extension locations to extensions.
#[derive(Clone, Default)]
pub struct ExtensionCatalog {
    entries: BTreeMap<String, Arc<dyn EncryptorExtension>>,
}

impl ExtensionCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with the built-in `rotn` and `chacha20` extensions.
    pub fn builtin() -> Self {
        Self::new()
            .with(ROTN_ENCRYPTOR, Arc::new(RotnExtension))
            .with(CHACHA20_ENCRYPTOR, Arc::new(ChaChaExtension::default()))
    }

    /// Adds or replaces an entry.
    #[must_use]
    pub fn with(mut self, location: &str, extension: Arc<dyn EncryptorExtension>) -> Self {
        self.entries.insert(location.to_string(), extension);
        self
    }

    /// Finds the extension for a location.
    pub fn lookup(&self, location: &str) -> CryptoResult<Arc<dyn EncryptorExtension>> {
        if let Some(ext) = self.entries.get(location) {
            return Ok(Arc::clone(ext));
        }
        Path::new(location)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.strip_prefix(LIBRARY_PREFIX))
            .and_then(|name| self.entries.get(name))
            .map(Arc::clone)
            .ok_or_else(|| CryptoError::ExtensionNotFound(location.to_string()))
    }

    /// Loads every listed extension into `registry`, each at most once, and
    /// returns the names of the extensions loaded.
    ///
    /// Every location is looked up before anything is registered, so an
    /// unknown location leaves the registry untouched.
    pub fn load_all<S: AsRef<str>>(
        &self,
        locations: &[S],
        registry: &EncryptorRegistry,
    ) -> CryptoResult<Vec<String>> {
        let extensions = locations
            .iter()
            .map(|loc| self.lookup(loc.as_ref()))
            .collect::<CryptoResult<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let mut loaded = Vec::new();
        for ext in extensions {
            if !seen.insert(ext.name().to_string()) {
                continue;
            }
            ext.load(registry)?;
            info!(extension = %ext.name(), "Encryptor extension loaded");
            loaded.push(ext.name().to_string());
        }
        Ok(loaded)
    }

    /// Catalog locations, sorted.
    pub fn locations(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ExtensionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionCatalog")
            .field("locations", &self.locations())
            .finish()
    }
}
