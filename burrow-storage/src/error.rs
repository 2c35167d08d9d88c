//! Error types for the storage layer.

use burrow_crypto::CryptoError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Descriptor field on which a persisted and a requested encryption differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchField {
    Name,
    Keyid,
}

impl fmt::Display for MismatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("name"),
            Self::Keyid => f.write_str("keyid"),
        }
    }
}

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An encryptor name is neither registered nor `none`.
    #[error("unknown encryptor '{0}'")]
    UnknownEncryptor(String),

    /// An extension could not be loaded, or no loaded extension provides
    /// the requested encryptor.
    #[error("extension load failed for '{location}': {reason}")]
    ExtensionLoad { location: String, reason: String },

    /// The metadata file or a table's metadata record is not well formed.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    /// The requested encryption is incompatible with a table's persisted
    /// descriptor. Never carries the secret key.
    #[error(
        "{uri}: encryption {field} mismatch: table was written with '{persisted}', \
         connection requested '{requested}'"
    )]
    EncryptionMismatch {
        uri: String,
        field: MismatchField,
        persisted: String,
        requested: String,
    },

    /// A page could not be encrypted.
    #[error("cannot encrypt {location}: {reason}")]
    Encryption { location: String, reason: String },

    /// A page could not be decrypted: authentication failure, truncated
    /// frame, length mismatch or an encrypted frame without an encryptor.
    #[error("cannot decrypt {location}: {reason}")]
    Decryption { location: String, reason: String },

    /// Page contents are not well formed.
    #[error("corrupt {location}: {reason}")]
    Corruption { location: String, reason: String },

    /// Invalid connection or table configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine home does not exist and `create` was not given.
    #[error("home directory {} does not exist", .0.display())]
    HomeNotFound(PathBuf),

    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A table exists with a different configuration.
    #[error("table {uri} already exists: {reason}")]
    TableExists { uri: String, reason: String },

    /// The table handle belongs to a closed connection or a dropped table.
    #[error("table handle is closed: {0}")]
    Closed(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<burrow_types::Error> for StorageError {
    fn from(err: burrow_types::Error) -> Self {
        match err {
            burrow_types::Error::MalformedDescriptor(msg) => Self::MalformedMetadata(msg),
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}

impl From<CryptoError> for StorageError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnknownEncryptor(name) => Self::UnknownEncryptor(name),
            CryptoError::ExtensionNotFound(location) => Self::ExtensionLoad {
                location,
                reason: "not found in the extension catalog".to_string(),
            },
            CryptoError::DuplicateName(name) => Self::ExtensionLoad {
                location: name,
                reason: "encryptor name is already registered".to_string(),
            },
            CryptoError::Encryption(reason) => Self::Encryption {
                location: "encryptor output".to_string(),
                reason,
            },
            CryptoError::Decryption(reason) => Self::Decryption {
                location: "encryptor input".to_string(),
                reason,
            },
            e @ (CryptoError::InvalidKeyId { .. }
            | CryptoError::InvalidSecretKey { .. }
            | CryptoError::KeyDerivation(_)) => Self::InvalidConfig(e.to_string()),
        }
    }
}
