//! Leaf and index page images.
//!
//! ```text
//! leaf:  [1][count: u32]{[klen: u32][key][vlen: u32][value]}*
//! index: [2][count: u32]{[klen: u32][first key][offset: u64][size: u32][records: u32]}*
//! ```
//!
//! All integers are little-endian. Keys are strictly ascending and the
//! first index entry has an empty first key.

use crate::block::BlockAddr;
use std::collections::BTreeMap;

const LEAF_PAGE: u8 = 1;
const INDEX_PAGE: u8 = 2;

/// Records held by a leaf page.
pub type LeafRecords = BTreeMap<Vec<u8>, Vec<u8>>;

/// One child of the root index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub first_key: Vec<u8>,
    pub addr: BlockAddr,
    pub records: u32,
}

/// Encoded size of one leaf record.
pub fn record_size(key: &[u8], value: &[u8]) -> usize {
    8 + key.len() + value.len()
}

/// Bytes of a leaf page with no records.
pub const LEAF_OVERHEAD: usize = 5;

pub fn encode_leaf(records: &LeafRecords) -> Vec<u8> {
    let size = LEAF_OVERHEAD
        + records
            .iter()
            .map(|(k, v)| record_size(k, v))
            .sum::<usize>();
    let mut out = Vec::with_capacity(size);
    out.push(LEAF_PAGE);
    put_u32(&mut out, records.len());
    for (key, value) in records {
        put_bytes(&mut out, key);
        put_bytes(&mut out, value);
    }
    out
}

pub fn decode_leaf(page: &[u8]) -> Result<LeafRecords, String> {
    let mut reader = Reader::new(page);
    reader.expect_kind(LEAF_PAGE)?;
    let count = reader.u32()?;
    let mut records = LeafRecords::new();
    let mut last: Option<&[u8]> = None;
    for _ in 0..count {
        let key = reader.bytes()?;
        let value = reader.bytes()?;
        if last.is_some_and(|prev| prev >= key) {
            return Err("leaf keys are not strictly ascending".to_string());
        }
        last = Some(key);
        records.insert(key.to_vec(), value.to_vec());
    }
    reader.finish()?;
    Ok(records)
}

pub fn encode_index(entries: &[IndexEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(INDEX_PAGE);
    put_u32(&mut out, entries.len());
    for entry in entries {
        put_bytes(&mut out, &entry.first_key);
        out.extend_from_slice(&entry.addr.offset.to_le_bytes());
        out.extend_from_slice(&entry.addr.size.to_le_bytes());
        out.extend_from_slice(&entry.records.to_le_bytes());
    }
    out
}

pub fn decode_index(page: &[u8]) -> Result<Vec<IndexEntry>, String> {
    let mut reader = Reader::new(page);
    reader.expect_kind(INDEX_PAGE)?;
    let count = reader.u32()?;
    let mut entries: Vec<IndexEntry> = Vec::new();
    for i in 0..count {
        let first_key = reader.bytes()?.to_vec();
        let offset = reader.u64()?;
        let size = reader.u32()?;
        let records = reader.u32()?;
        match entries.last() {
            None if !first_key.is_empty() => {
                return Err("first index entry must have an empty key".to_string());
            }
            Some(prev) if prev.first_key >= first_key => {
                return Err(format!("index entry {i} is out of order"));
            }
            _ => {}
        }
        entries.push(IndexEntry {
            first_key,
            addr: BlockAddr { offset, size },
            records,
        });
    }
    reader.finish()?;
    if entries.is_empty() {
        return Err("index page has no entries".to_string());
    }
    Ok(entries)
}

fn put_u32(out: &mut Vec<u8>, n: usize) {
    // Page sizes are bounded well below u32::MAX by the codec.
    out.extend_from_slice(&(n as u32).to_le_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len());
    out.extend_from_slice(bytes);
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| format!("page truncated at byte {} (need {n} more)", self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn expect_kind(&mut self, kind: u8) -> Result<(), String> {
        match self.take(1)?[0] {
            k if k == kind => Ok(()),
            k => Err(format!("expected page type {kind}, found {k}")),
        }
    }

    fn u32(&mut self) -> Result<u32, String> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(b))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(b))
    }

    fn bytes(&mut self) -> Result<&'a [u8], String> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn finish(&self) -> Result<(), String> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(format!("{} trailing bytes", self.buf.len() - self.pos))
        }
    }
}
