//! Error types for the encryption layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in encryptor registration, resolution and use.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No factory is registered under this name.
    #[error("unknown encryptor: {0}")]
    UnknownEncryptor(String),

    /// A factory is already registered under this name.
    #[error("encryptor already registered: {0}")]
    DuplicateName(String),

    /// No extension is known at this location.
    #[error("no encryptor extension at '{0}'")]
    ExtensionNotFound(String),

    /// The keyid is not acceptable to the named encryptor.
    #[error("invalid keyid for encryptor '{name}': {reason}")]
    InvalidKeyId { name: String, reason: String },

    /// The secret key is not acceptable to the named encryptor.
    #[error("invalid secretkey for encryptor '{name}': {reason}")]
    InvalidSecretKey { name: String, reason: String },

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key or tampered data).
    #[error("decryption failed: {0}")]
    Decryption(String),
}
