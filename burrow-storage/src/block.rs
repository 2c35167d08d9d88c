//! Append-only block files.

use crate::error::{StorageError, StorageResult};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Location of a block inside a table's block file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockAddr {
    pub offset: u64,
    pub size: u32,
}

impl fmt::Display for BlockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}+{}", self.offset, self.size)
    }
}

/// A table's block file. Blocks are only ever appended; a checkpoint makes
/// new blocks durable and leaves older blocks in place.
pub struct BlockFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl BlockFile {
    /// Creates an empty block file, truncating any stale file at `path`.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Opens an existing block file.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Appends a block and returns its address.
    pub fn append(&self, bytes: &[u8]) -> StorageResult<BlockAddr> {
        let size = u32::try_from(bytes.len()).map_err(|_| StorageError::Corruption {
            location: self.path.display().to_string(),
            reason: format!("block of {} bytes is too large", bytes.len()),
        })?;
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(bytes)?;
        Ok(BlockAddr { offset, size })
    }

    /// Reads the block at `addr`. Addresses past the end of the file are
    /// reported as corruption.
    pub fn read(&self, addr: BlockAddr) -> StorageResult<Vec<u8>> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        let len = file.metadata()?.len();
        let end = addr.offset.checked_add(u64::from(addr.size));
        if end.is_none_or(|end| end > len) {
            return Err(StorageError::Corruption {
                location: format!("{} {addr}", self.path.display()),
                reason: format!("block extends past end of file ({len} bytes)"),
            });
        }
        file.seek(SeekFrom::Start(addr.offset))?;
        let mut buf = vec![0u8; addr.size as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Flushes appended blocks to stable storage.
    pub fn sync(&self) -> StorageResult<()> {
        let file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.sync_all()?;
        Ok(())
    }
}

impl fmt::Debug for BlockFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockFile").field("path", &self.path).finish()
    }
}
