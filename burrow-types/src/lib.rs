//! Core type definitions for Burrow.
//!
//! This crate defines the plain-data types shared by the crypto and storage
//! layers:
//! - Configuration strings (`key=value,group=(k=v),list=[a,b]`)
//! - Encryption descriptors (persisted) and encryption configs (requested)
//! - Connection and table identifiers
//! - Secret keys that are zeroized on drop and never printed
//!
//! Nothing here performs I/O or cryptography.

pub mod config;
mod encryption;
mod ids;
mod secret;

pub use config::{ConfigMap, ConfigValue};
pub use encryption::{EncryptionConfig, EncryptionDescriptor, NONE_ENCRYPTOR};
pub use ids::{ConnectionId, TableUri};
pub use secret::SecretKey;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config syntax error at offset {offset}: {message}")]
    ConfigSyntax { offset: usize, message: String },

    #[error("invalid config value for '{key}': {message}")]
    ConfigValue { key: String, message: String },

    #[error("malformed encryption descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("invalid table URI: {0}")]
    InvalidUri(String),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
