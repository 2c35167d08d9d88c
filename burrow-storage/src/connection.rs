//! Connections: the entry point of the engine.
//!
//! Opening a connection loads the configured extensions into a fresh
//! encryptor registry, resolves the requested encryptor, and validates every
//! table's persisted descriptor against the request. All of that happens
//! before any page is read; if any table is incompatible, the open fails and
//! no handle is produced.

use crate::error::{StorageError, StorageResult};
use crate::metadata::{MetadataStore, TableMeta};
use crate::settings::{ConnectionSettings, TableSettings};
use crate::table::Table;
use crate::validate::{check_compatibility, OpenOutcome};
use burrow_crypto::{CryptoError, Encryptor, EncryptorRegistry, ExtensionCatalog};
use burrow_types::{ConnectionId, EncryptionConfig, EncryptionDescriptor, TableUri};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// An open engine home.
pub struct Connection {
    id: ConnectionId,
    home: PathBuf,
    settings: ConnectionSettings,
    catalog: ExtensionCatalog,
    registry: EncryptorRegistry,
    requested: Arc<dyn Encryptor>,
    metadata: Arc<MetadataStore>,
    tables: Mutex<HashMap<TableUri, Arc<Table>>>,
}

impl Connection {
    /// Opens the engine home at `home`.
    ///
    /// Extensions named in `config` are looked up in `catalog`.
    pub fn open(
        home: impl AsRef<Path>,
        config: &str,
        catalog: &ExtensionCatalog,
    ) -> StorageResult<Self> {
        let settings = ConnectionSettings::parse(config)?;
        let prefix = settings.error_prefix.clone();
        Self::open_with(home.as_ref().to_path_buf(), settings, catalog.clone()).inspect_err(|e| {
            warn!(error = %e, "{prefix}connection open failed");
        })
    }

    fn open_with(
        home: PathBuf,
        settings: ConnectionSettings,
        catalog: ExtensionCatalog,
    ) -> StorageResult<Self> {
        if !home.is_dir() {
            if !settings.create {
                return Err(StorageError::HomeNotFound(home));
            }
            fs::create_dir_all(&home)?;
        }

        let registry = EncryptorRegistry::new();
        catalog
            .load_all(&settings.extensions, &registry)
            .map_err(|e| match e {
                CryptoError::ExtensionNotFound(_) => StorageError::from(e),
                other => StorageError::ExtensionLoad {
                    location: settings.extensions.join(","),
                    reason: other.to_string(),
                },
            })?;

        let name = settings.encryption.name();
        if !registry.contains(name) {
            return Err(StorageError::ExtensionLoad {
                location: name.to_string(),
                reason: "no loaded extension provides this encryptor".to_string(),
            });
        }
        let requested = registry.resolve_config(&settings.encryption)?;

        let metadata = Arc::new(MetadataStore::load(&home)?);
        let descriptor = settings.encryption.descriptor();
        let tables = metadata.tables()?;
        let mut upgrades = 0usize;
        for (uri, meta) in &tables {
            if check_compatibility(uri, &meta.encryption, &descriptor)? == OpenOutcome::Upgrade {
                info!(table = %uri, to = %descriptor, "Plaintext table opened with encryption");
                upgrades += 1;
            }
        }

        let id = ConnectionId::new();
        info!(
            connection = %id,
            home = %home.display(),
            encryption = %descriptor,
            tables = tables.len(),
            upgrades,
            "Connection opened"
        );

        Ok(Self {
            id,
            home,
            settings,
            catalog,
            registry,
            requested,
            metadata,
            tables: Mutex::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// The encryption requested at open.
    pub fn encryption(&self) -> &EncryptionConfig {
        &self.settings.encryption
    }

    pub fn error_prefix(&self) -> &str {
        &self.settings.error_prefix
    }

    /// The registry populated from this connection's extensions.
    pub fn registry(&self) -> &EncryptorRegistry {
        &self.registry
    }

    /// Creates a table. Without an `encryption` option the table inherits
    /// the connection's requested encryption.
    ///
    /// Creating a table that already exists with the same configuration is
    /// a no-op.
    pub fn create_table(&self, uri: &str, config: &str) -> StorageResult<()> {
        let uri = TableUri::parse(uri)?;
        let settings = TableSettings::parse(config)?;
        let requested = self.settings.encryption.descriptor();
        let descriptor = settings.encryption.unwrap_or_else(|| requested.clone());
        let meta = TableMeta {
            key_format: settings.key_format,
            value_format: settings.value_format,
            encryption: descriptor,
            checkpoint: None,
            plaintext_pages: false,
        };

        let mut tables = self.lock_tables();
        if let Some(existing) = self.metadata.get(&uri)? {
            let same = existing.key_format == meta.key_format
                && existing.value_format == meta.value_format
                && existing.encryption == meta.encryption;
            if same {
                return Ok(());
            }
            return Err(StorageError::TableExists {
                uri: uri.to_string(),
                reason: format!("existing configuration is {}", existing.to_record()),
            });
        }

        // The connection's secret only customizes the connection's own
        // encryptor; an explicit table descriptor is resolved without one.
        let encryptor = if meta.encryption == requested {
            Arc::clone(&self.requested)
        } else {
            self.registry.resolve_descriptor(&meta.encryption, None)?
        };

        let table = Table::create(
            &self.home,
            uri.clone(),
            meta,
            encryptor,
            Arc::clone(&self.metadata),
        )?;
        tables.insert(uri, Arc::new(table));
        Ok(())
    }

    /// Returns a handle to an existing table, reading its root page on
    /// first use.
    pub fn open_table(&self, uri: &str) -> StorageResult<Arc<Table>> {
        let uri = TableUri::parse(uri)?;
        let mut tables = self.lock_tables();
        if let Some(table) = tables.get(&uri) {
            return Ok(Arc::clone(table));
        }

        let meta = self
            .metadata
            .get(&uri)?
            .ok_or_else(|| StorageError::TableNotFound(uri.to_string()))?;
        let requested = self.settings.encryption.descriptor();
        let target = match check_compatibility(&uri, &meta.encryption, &requested)? {
            OpenOutcome::Unchanged => meta.encryption.clone(),
            OpenOutcome::Upgrade => requested,
        };

        let table = Arc::new(Table::open(
            &self.home,
            uri.clone(),
            meta,
            target,
            Arc::clone(&self.requested),
            Arc::clone(&self.metadata),
        )?);
        debug!(connection = %self.id, table = %uri, "Table opened");
        tables.insert(uri, Arc::clone(&table));
        Ok(table)
    }

    /// Removes a table's metadata record and block file. Existing handles
    /// to the table are closed first; a checkpoint of the table that is
    /// already running finishes before the record is removed.
    pub fn drop_table(&self, uri: &str) -> StorageResult<()> {
        let uri = TableUri::parse(uri)?;
        let mut tables = self.lock_tables();
        if let Some(table) = tables.remove(&uri) {
            table.close();
        }
        if !self.metadata.remove(&uri)? {
            return Err(StorageError::TableNotFound(uri.to_string()));
        }
        match fs::remove_file(self.home.join(uri.file_name())) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(connection = %self.id, table = %uri, "Table dropped");
        Ok(())
    }

    /// URIs of every table in the home, sorted.
    pub fn list_tables(&self) -> StorageResult<Vec<TableUri>> {
        Ok(self
            .metadata
            .tables()?
            .into_iter()
            .map(|(uri, _)| uri)
            .collect())
    }

    /// The persisted descriptor of a table, read from metadata only.
    pub fn table_descriptor(&self, uri: &str) -> StorageResult<EncryptionDescriptor> {
        let uri = TableUri::parse(uri)?;
        self.metadata
            .get(&uri)?
            .map(|meta| meta.encryption)
            .ok_or_else(|| StorageError::TableNotFound(uri.to_string()))
    }

    /// Writes every open table's dirty pages and updates their metadata.
    /// Tables dropped while the checkpoint runs are skipped.
    pub fn checkpoint(&self) -> StorageResult<()> {
        let tables: Vec<Arc<Table>> = self.lock_tables().values().cloned().collect();
        let mut written = 0usize;
        for table in tables.iter().filter(|table| !table.is_closed()) {
            match table.checkpoint() {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(table = %table.uri(), error = %e, "{}checkpoint failed", self.error_prefix());
                    return Err(e);
                }
            }
        }
        debug!(connection = %self.id, tables = written, "Checkpoint complete");
        Ok(())
    }

    /// Checkpoints and closes the connection. Table handles become unusable.
    pub fn close(self) -> StorageResult<()> {
        let result = self.checkpoint();
        self.shutdown();
        info!(connection = %self.id, "Connection closed");
        result
    }

    /// Checkpoints, then replaces this connection with one opened on the
    /// same home with `config`.
    ///
    /// If the new open fails, this connection is left open and usable.
    pub fn reopen(&mut self, config: &str) -> StorageResult<()> {
        self.checkpoint()?;
        let next = Self::open(&self.home, config, &self.catalog)?;
        let previous = std::mem::replace(self, next);
        previous.shutdown();
        info!(from = %previous.id, to = %self.id, "Connection reopened");
        Ok(())
    }

    fn shutdown(&self) {
        for (_, table) in self.lock_tables().drain() {
            table.close();
        }
    }

    fn lock_tables(&self) -> MutexGuard<'_, HashMap<TableUri, Arc<Table>>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("home", &self.home)
            .field("encryption", &self.settings.encryption.descriptor())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
