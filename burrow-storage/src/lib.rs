//! Page storage with pluggable table encryption.
//!
//! # Architecture
//!
//! - A [`Connection`] owns an engine home, an encryptor registry populated
//!   from its extensions, and the encryption requested at open
//! - Every table persists an encryption descriptor in its metadata record;
//!   [`check_compatibility`] compares it with the request on every open and
//!   allows only an unchanged descriptor or a plaintext-to-encrypted upgrade
//! - Pages pass through [`encode_page`] / [`decode_page`] between the
//!   in-memory tree and the append-only block file
//! - Metadata is stored unencrypted in `burrow.meta` and replaced atomically

mod block;
mod codec;
mod connection;
mod error;
mod metadata;
mod page;
mod settings;
mod table;
mod validate;

pub use block::{BlockAddr, BlockFile};
pub use codec::{decode_page, encode_page, is_encrypted, CodecError, FRAME_HEADER_SIZE};
pub use connection::Connection;
pub use error::{MismatchField, StorageError, StorageResult};
pub use metadata::{MetadataStore, TableMeta, METADATA_FILE};
pub use settings::{ConnectionSettings, TableSettings, FORMATS};
pub use table::{Table, LEAF_SPLIT_BYTES};
pub use validate::{check_compatibility, OpenOutcome};
