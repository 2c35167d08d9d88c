//! Table metadata records and the per-home metadata file.
//!
//! Each table has one metadata record, a configuration string such as
//!
//! ```text
//! key_format=S,value_format=S,encryption=(name=rotn,keyid=11),checkpoint=(addr=4096,size=212)
//! ```
//!
//! A table encrypted by an upgrade also carries the bare `plaintext_pages`
//! flag: blocks written before the upgrade are still unencrypted.
//!
//! All records of an engine home live in `burrow.meta`, a JSON document that
//! is replaced atomically on every change. Metadata is never encrypted: the
//! descriptor must be readable before any encryptor has been resolved.

use crate::block::BlockAddr;
use crate::error::{StorageError, StorageResult};
use burrow_types::{ConfigMap, ConfigValue, EncryptionDescriptor, TableUri};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Name of the metadata file inside an engine home.
pub const METADATA_FILE: &str = "burrow.meta";

const METADATA_VERSION: u32 = 1;

/// Decoded metadata record of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub key_format: String,
    pub value_format: String,
    pub encryption: EncryptionDescriptor,
    /// Root page of the last checkpoint, `None` before the first one.
    pub checkpoint: Option<BlockAddr>,
    /// Set when the table was widened from no encryption.
    pub plaintext_pages: bool,
}

impl TableMeta {
    /// Encodes the record string.
    pub fn to_record(&self) -> String {
        let mut map = ConfigMap::new();
        map.push("key_format", ConfigValue::Str(self.key_format.clone()));
        map.push("value_format", ConfigValue::Str(self.value_format.clone()));
        map.push("encryption", self.encryption.to_config());
        if self.plaintext_pages {
            map.push("plaintext_pages", ConfigValue::Bool(true));
        }
        if let Some(addr) = self.checkpoint {
            let mut group = ConfigMap::new();
            group.push("addr", ConfigValue::Str(addr.offset.to_string()));
            group.push("size", ConfigValue::Str(addr.size.to_string()));
            map.push("checkpoint", ConfigValue::Group(group));
        }
        map.to_string()
    }

    /// Decodes a record string.
    pub fn from_record(record: &str) -> StorageResult<Self> {
        let map = ConfigMap::parse(record).map_err(malformed)?;
        let key_format = map.get_str("key_format").map_err(malformed)?;
        let value_format = map.get_str("value_format").map_err(malformed)?;
        let encryption = EncryptionDescriptor::from_config(&map)?;
        let plaintext_pages = map.get_bool("plaintext_pages").map_err(malformed)?;
        let checkpoint = match map.get_group("checkpoint").map_err(malformed)? {
            None => None,
            Some(group) => Some(BlockAddr {
                offset: number(group, "addr")?,
                size: number(group, "size")?,
            }),
        };
        Ok(Self {
            key_format: key_format.unwrap_or("u").to_string(),
            value_format: value_format.unwrap_or("u").to_string(),
            encryption,
            checkpoint,
            plaintext_pages: plaintext_pages.unwrap_or(false),
        })
    }

    /// True if blocks of this table may hold unencrypted frames.
    pub fn allows_plaintext(&self) -> bool {
        self.encryption.is_none() || self.plaintext_pages
    }
}

fn malformed(err: burrow_types::Error) -> StorageError {
    StorageError::MalformedMetadata(err.to_string())
}

fn number<T: std::str::FromStr>(group: &ConfigMap, key: &str) -> StorageResult<T> {
    group
        .get_str(key)
        .map_err(malformed)?
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StorageError::MalformedMetadata(format!("checkpoint {key} is not a number")))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataDocument {
    version: u32,
    tables: BTreeMap<String, String>,
}

/// The metadata file of one engine home.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    doc: Mutex<MetadataDocument>,
}

impl MetadataStore {
    /// Loads `burrow.meta` from `home`. A missing file is an empty store;
    /// nothing is written until the first change.
    pub fn load(home: &Path) -> StorageResult<Self> {
        let path = home.join(METADATA_FILE);
        let doc = match fs::read(&path) {
            Ok(bytes) => {
                let doc: MetadataDocument = serde_json::from_slice(&bytes).map_err(|e| {
                    StorageError::MalformedMetadata(format!("{}: {e}", path.display()))
                })?;
                if doc.version != METADATA_VERSION {
                    return Err(StorageError::MalformedMetadata(format!(
                        "unsupported metadata version {}",
                        doc.version
                    )));
                }
                doc
            }
            Err(e) if e.kind() == ErrorKind::NotFound => MetadataDocument {
                version: METADATA_VERSION,
                tables: BTreeMap::new(),
            },
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Decodes every table record, sorted by URI.
    pub fn tables(&self) -> StorageResult<Vec<(TableUri, TableMeta)>> {
        let doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        doc.tables
            .iter()
            .map(|(uri, record)| {
                let uri = TableUri::parse(uri)
                    .map_err(|e| StorageError::MalformedMetadata(e.to_string()))?;
                let meta = TableMeta::from_record(record).map_err(|e| in_table(&uri, e))?;
                Ok((uri, meta))
            })
            .collect()
    }

    pub fn get(&self, uri: &TableUri) -> StorageResult<Option<TableMeta>> {
        self.record(uri)
            .map(|record| TableMeta::from_record(&record).map_err(|e| in_table(uri, e)))
            .transpose()
    }

    /// The raw record string of a table.
    pub fn record(&self, uri: &TableUri) -> Option<String> {
        let doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        doc.tables.get(uri.as_str()).cloned()
    }

    /// Inserts or replaces a table record and persists the file.
    pub fn put(&self, uri: &TableUri, meta: &TableMeta) -> StorageResult<()> {
        let mut doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        let previous = doc
            .tables
            .insert(uri.as_str().to_string(), meta.to_record());
        if let Err(e) = self.persist(&doc) {
            match previous {
                Some(record) => doc.tables.insert(uri.as_str().to_string(), record),
                None => doc.tables.remove(uri.as_str()),
            };
            return Err(e);
        }
        debug!(table = %uri, record = %meta.to_record(), "Metadata record written");
        Ok(())
    }

    /// Removes a table record. Returns false if there was none.
    pub fn remove(&self, uri: &TableUri) -> StorageResult<bool> {
        let mut doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        let Some(previous) = doc.tables.remove(uri.as_str()) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&doc) {
            doc.tables.insert(uri.as_str().to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    fn persist(&self, doc: &MetadataDocument) -> StorageResult<()> {
        let tmp = self.path.with_extension("meta.tmp");
        let bytes = serde_json::to_vec_pretty(doc)?;
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn in_table(uri: &TableUri, err: StorageError) -> StorageError {
    match err {
        StorageError::MalformedMetadata(msg) => {
            StorageError::MalformedMetadata(format!("{uri}: {msg}"))
        }
        other => other,
    }
}
