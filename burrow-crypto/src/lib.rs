//! Pluggable encryptors for Burrow pages.
//!
//! An [`Encryptor`] is a named transform with `encrypt`, `decrypt` and a
//! sizing bound. Encryptors are produced by an [`EncryptorFactory`], which
//! customizes a concrete instance from a keyid and an optional secret key.
//! Factories are registered by name in an [`EncryptorRegistry`], usually by an
//! [`EncryptorExtension`] picked from an [`ExtensionCatalog`].
//!
//! Two extensions are built in:
//! - `rotn`: letter rotation, a reference cipher for tests. It performs no
//!   integrity check, so a wrong key yields garbage rather than an error.
//! - `chacha20`: ChaCha20-Poly1305 with an Argon2id-derived key. Wrong keys
//!   and tampered pages fail with [`CryptoError::Decryption`].
//!
//! The identity encryptor `none` is always available and never registered.

mod chacha;
mod cipher;
mod encryptor;
mod error;
mod extension;
mod key;
mod registry;
mod rotn;

pub use chacha::{ChaChaEncryptor, ChaChaFactory, CHACHA20_ENCRYPTOR};
pub use cipher::{open, seal, SealedData, NONCE_SIZE, TAG_SIZE};
pub use encryptor::{Encryptor, EncryptorFactory, NoneEncryptor};
pub use error::{CryptoError, CryptoResult};
pub use extension::{ChaChaExtension, EncryptorExtension, ExtensionCatalog, RotnExtension};
pub use key::{derive_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use registry::EncryptorRegistry;
pub use rotn::{RotnEncryptor, RotnFactory, ROTN_ENCRYPTOR, ROTN_HEADER};
