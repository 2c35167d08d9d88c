//! Tables: a root index page over lazily loaded leaf pages.
//!
//! Every page goes through the page codec with the table's encryptor on its
//! way to and from the block file. Leaves are read on first access and
//! written back only at checkpoint, and only if they changed.

use crate::block::{BlockAddr, BlockFile};
use crate::codec::{decode_page, encode_page, is_encrypted};
use crate::error::{StorageError, StorageResult};
use crate::metadata::{MetadataStore, TableMeta};
use crate::page::{
    decode_index, decode_leaf, encode_index, encode_leaf, record_size, IndexEntry, LeafRecords,
    LEAF_OVERHEAD,
};
use burrow_crypto::Encryptor;
use burrow_types::{EncryptionDescriptor, TableUri};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// A leaf splits once its encoded image grows past this size.
pub const LEAF_SPLIT_BYTES: usize = 32 * 1024;

#[derive(Debug)]
struct LeafSlot {
    /// Lower bound of the keys in this leaf; empty for the first leaf.
    first_key: Vec<u8>,
    addr: Option<BlockAddr>,
    count: usize,
    /// Encoded size, valid while `records` is loaded.
    bytes: usize,
    records: Option<LeafRecords>,
    dirty: bool,
}

impl LeafSlot {
    fn empty() -> Self {
        Self {
            first_key: Vec::new(),
            addr: None,
            count: 0,
            bytes: LEAF_OVERHEAD,
            records: Some(LeafRecords::new()),
            dirty: false,
        }
    }

    fn from_entry(entry: IndexEntry) -> Self {
        Self {
            first_key: entry.first_key,
            addr: Some(entry.addr),
            count: entry.records as usize,
            bytes: 0,
            records: None,
            dirty: false,
        }
    }

    fn loaded(first_key: Vec<u8>, records: LeafRecords) -> Self {
        let bytes = leaf_bytes(&records);
        Self {
            first_key,
            addr: None,
            count: records.len(),
            bytes,
            records: Some(records),
            dirty: true,
        }
    }
}

fn leaf_bytes(records: &LeafRecords) -> usize {
    LEAF_OVERHEAD + records.iter().map(|(k, v)| record_size(k, v)).sum::<usize>()
}

#[derive(Debug)]
struct TableState {
    /// The record as last written to the metadata file.
    meta: TableMeta,
    leaves: Vec<LeafSlot>,
}

impl TableState {
    fn slot_for(&self, key: &[u8]) -> usize {
        self.leaves
            .partition_point(|slot| slot.first_key.as_slice() <= key)
            .saturating_sub(1)
    }
}

/// An open table.
///
/// Handles are shared (`Arc<Table>`) and safe to use from many threads.
/// Closing the owning connection or dropping the table invalidates them.
pub struct Table {
    uri: TableUri,
    blocks: BlockFile,
    encryptor: Arc<dyn Encryptor>,
    /// Descriptor that describes pages written by this handle.
    target: EncryptionDescriptor,
    /// Whether unencrypted frames are accepted on read.
    allow_plaintext: bool,
    metadata: Arc<MetadataStore>,
    state: RwLock<TableState>,
    closed: AtomicBool,
}

impl Table {
    /// Creates the block file and the metadata record of a new table.
    pub(crate) fn create(
        home: &Path,
        uri: TableUri,
        meta: TableMeta,
        encryptor: Arc<dyn Encryptor>,
        metadata: Arc<MetadataStore>,
    ) -> StorageResult<Self> {
        let blocks = BlockFile::create(&home.join(uri.file_name()))?;
        metadata.put(&uri, &meta)?;
        info!(table = %uri, encryption = %meta.encryption, "Table created");
        Ok(Self {
            uri,
            blocks,
            target: meta.encryption.clone(),
            allow_plaintext: meta.allows_plaintext(),
            encryptor,
            metadata,
            state: RwLock::new(TableState {
                meta,
                leaves: vec![LeafSlot::empty()],
            }),
            closed: AtomicBool::new(false),
        })
    }

    /// Opens an existing table and reads its root page.
    ///
    /// `target` differs from the persisted descriptor only after an
    /// upgrade; the metadata record is widened to it at the first checkpoint
    /// that writes pages.
    pub(crate) fn open(
        home: &Path,
        uri: TableUri,
        meta: TableMeta,
        target: EncryptionDescriptor,
        encryptor: Arc<dyn Encryptor>,
        metadata: Arc<MetadataStore>,
    ) -> StorageResult<Self> {
        let blocks = BlockFile::open(&home.join(uri.file_name())).map_err(|e| match e {
            StorageError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                StorageError::Corruption {
                    location: uri.to_string(),
                    reason: format!("block file {} is missing", uri.file_name()),
                }
            }
            other => other,
        })?;

        let table = Self {
            uri,
            blocks,
            encryptor,
            target,
            allow_plaintext: meta.allows_plaintext(),
            metadata,
            state: RwLock::new(TableState {
                meta: meta.clone(),
                leaves: Vec::new(),
            }),
            closed: AtomicBool::new(false),
        };

        let leaves = match meta.checkpoint {
            None => vec![LeafSlot::empty()],
            Some(root) => {
                let page = table.read_page(root)?;
                decode_index(&page)
                    .map_err(|reason| table.corruption(root, reason))?
                    .into_iter()
                    .map(LeafSlot::from_entry)
                    .collect()
            }
        };
        table.write_state().leaves = leaves;
        Ok(table)
    }

    pub fn uri(&self) -> &TableUri {
        &self.uri
    }

    /// The descriptor currently recorded in the metadata file.
    pub fn descriptor(&self) -> EncryptionDescriptor {
        self.read_state().meta.encryption.clone()
    }

    pub fn key_format(&self) -> String {
        self.read_state().meta.key_format.clone()
    }

    pub fn value_format(&self) -> String {
        self.read_state().meta.value_format.clone()
    }

    /// Inserts or overwrites a record.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;
        let mut state = self.write_state();
        let idx = state.slot_for(key);
        self.load_leaf(&mut state, idx)?;

        let slot = &mut state.leaves[idx];
        let records = loaded_mut(slot);
        match records.insert(key.to_vec(), value.to_vec()) {
            Some(old) => {
                slot.bytes = slot.bytes + value.len() - old.len();
            }
            None => {
                slot.bytes += record_size(key, value);
                slot.count += 1;
            }
        }
        slot.dirty = true;

        if slot.bytes > LEAF_SPLIT_BYTES && slot.count > 1 {
            split_leaf(&mut state.leaves, idx);
        }
        Ok(())
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        {
            let state = self.read_state();
            let slot = &state.leaves[state.slot_for(key)];
            if let Some(records) = &slot.records {
                return Ok(records.get(key).cloned());
            }
        }
        let mut state = self.write_state();
        let idx = state.slot_for(key);
        self.load_leaf(&mut state, idx)?;
        Ok(loaded_mut(&mut state.leaves[idx]).get(key).cloned())
    }

    /// Removes a record, returning its value.
    pub fn remove(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        let mut state = self.write_state();
        let idx = state.slot_for(key);
        self.load_leaf(&mut state, idx)?;

        let slot = &mut state.leaves[idx];
        let removed = loaded_mut(slot).remove(key);
        if let Some(value) = &removed {
            slot.bytes -= record_size(key, value);
            slot.count -= 1;
            slot.dirty = true;
        }
        Ok(removed)
    }

    /// Every record in key order.
    pub fn scan(&self) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.ensure_open()?;
        let mut state = self.write_state();
        for idx in 0..state.leaves.len() {
            self.load_leaf(&mut state, idx)?;
        }
        Ok(state
            .leaves
            .iter()
            .filter_map(|slot| slot.records.as_ref())
            .flat_map(|records| records.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect())
    }

    /// Number of records. Does not read any page.
    pub fn len(&self) -> usize {
        self.read_state().leaves.iter().map(|slot| slot.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of leaf pages.
    pub fn leaf_count(&self) -> usize {
        self.read_state().leaves.len()
    }

    pub fn insert_str(&self, key: &str, value: &str) -> StorageResult<()> {
        self.insert(key.as_bytes(), value.as_bytes())
    }

    /// Looks up a string key and decodes the value as UTF-8.
    pub fn get_str(&self, key: &str) -> StorageResult<Option<String>> {
        self.get(key.as_bytes())?
            .map(|value| {
                String::from_utf8(value).map_err(|e| StorageError::Corruption {
                    location: format!("{} key {key:?}", self.uri),
                    reason: format!("value is not UTF-8: {e}"),
                })
            })
            .transpose()
    }

    pub fn remove_str(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.remove(key.as_bytes())
    }

    /// Writes dirty leaves and a new root page, then records the root in
    /// the metadata file. Returns false if nothing was written, including
    /// when the table was closed or dropped.
    pub(crate) fn checkpoint(&self) -> StorageResult<bool> {
        let mut state = self.write_state();
        if self.is_closed() || !state.leaves.iter().any(|slot| slot.dirty) {
            return Ok(false);
        }

        if state.meta.encryption != self.target {
            let mut widened = state.meta.clone();
            widened.plaintext_pages = widened.allows_plaintext();
            widened.encryption = self.target.clone();
            self.metadata.put(&self.uri, &widened)?;
            info!(
                table = %self.uri,
                from = %state.meta.encryption,
                to = %widened.encryption,
                "Table encryption widened"
            );
            state.meta = widened;
        }

        let mut written = 0usize;
        for slot in state.leaves.iter_mut().filter(|slot| slot.dirty) {
            let page = encode_leaf(loaded_mut(slot));
            slot.addr = Some(self.write_page(&page)?);
            slot.dirty = false;
            written += 1;
        }

        let mut entries = Vec::with_capacity(state.leaves.len());
        for slot in &state.leaves {
            let addr = slot.addr.ok_or_else(|| StorageError::Corruption {
                location: self.uri.to_string(),
                reason: "leaf without an address after checkpoint".to_string(),
            })?;
            entries.push(IndexEntry {
                first_key: slot.first_key.clone(),
                addr,
                records: u32::try_from(slot.count).unwrap_or(u32::MAX),
            });
        }
        let root = self.write_page(&encode_index(&entries))?;
        self.blocks.sync()?;

        let mut meta = state.meta.clone();
        meta.checkpoint = Some(root);
        self.metadata.put(&self.uri, &meta)?;
        state.meta = meta;

        debug!(table = %self.uri, leaves = written, %root, "Table checkpointed");
        Ok(true)
    }

    /// Marks the handle closed. Waits for an in-flight checkpoint, so once
    /// this returns the table writes nothing more to the metadata file.
    pub(crate) fn close(&self) {
        let _state = self.write_state();
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.is_closed() {
            Err(StorageError::Closed(self.uri.to_string()))
        } else {
            Ok(())
        }
    }

    fn load_leaf(&self, state: &mut TableState, idx: usize) -> StorageResult<()> {
        let slot = &mut state.leaves[idx];
        if slot.records.is_some() {
            return Ok(());
        }
        let addr = slot.addr.ok_or_else(|| StorageError::Corruption {
            location: self.uri.to_string(),
            reason: "leaf has neither records nor an address".to_string(),
        })?;
        let page = self.read_page(addr)?;
        let records = decode_leaf(&page).map_err(|reason| self.corruption(addr, reason))?;
        if records.len() != slot.count {
            return Err(self.corruption(
                addr,
                format!("leaf holds {} records, index records {}", records.len(), slot.count),
            ));
        }
        slot.bytes = leaf_bytes(&records);
        slot.records = Some(records);
        Ok(())
    }

    fn read_page(&self, addr: BlockAddr) -> StorageResult<Vec<u8>> {
        let frame = self.blocks.read(addr)?;
        if !self.allow_plaintext && !is_encrypted(&frame) {
            return Err(StorageError::Decryption {
                location: format!("{} {addr}", self.uri),
                reason: format!(
                    "unencrypted page in a table only ever written with {}",
                    self.encryptor.name()
                ),
            });
        }
        let page = decode_page(&frame, self.encryptor.as_ref())
            .map_err(|e| e.at(format!("{} {addr}", self.uri)))?;
        debug!(table = %self.uri, %addr, bytes = page.len(), "Page read");
        Ok(page)
    }

    fn write_page(&self, page: &[u8]) -> StorageResult<BlockAddr> {
        let frame = encode_page(page, self.encryptor.as_ref())
            .map_err(|e| e.at(format!("{} new page", self.uri)))?;
        let addr = self.blocks.append(&frame)?;
        debug!(table = %self.uri, %addr, bytes = page.len(), encryptor = %self.encryptor.name(), "Page written");
        Ok(addr)
    }

    fn corruption(&self, addr: BlockAddr, reason: String) -> StorageError {
        StorageError::Corruption {
            location: format!("{} {addr}", self.uri),
            reason,
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, TableState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, TableState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("uri", &self.uri)
            .field("encryptor", &self.encryptor.name())
            .field("target", &self.target)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Records of a slot that `load_leaf` has populated.
fn loaded_mut(slot: &mut LeafSlot) -> &mut LeafRecords {
    slot.records.get_or_insert_with(LeafRecords::new)
}

/// Splits the leaf at `idx` in half by record count.
fn split_leaf(leaves: &mut Vec<LeafSlot>, idx: usize) {
    let slot = &mut leaves[idx];
    let records = loaded_mut(slot);
    let Some(mid) = records.keys().nth(records.len() / 2).cloned() else {
        return;
    };
    let upper = records.split_off(&mid);
    let (count, bytes) = (records.len(), leaf_bytes(records));
    slot.count = count;
    slot.bytes = bytes;
    leaves.insert(idx + 1, LeafSlot::loaded(mid, upper));
}
