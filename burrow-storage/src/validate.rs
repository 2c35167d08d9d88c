//! Open-time consistency check between persisted and requested encryption.
//!
//! | persisted | requested | keyid     | result    |
//! |-----------|-----------|-----------|-----------|
//! | none      | none      |           | unchanged |
//! | none      | cipher    |           | upgrade   |
//! | cipherA   | none      |           | reject    |
//! | cipherA   | cipherA   | equal     | unchanged |
//! | cipherA   | cipherA   | different | reject    |
//! | cipherA   | cipherB   |           | reject    |
//!
//! Secret keys are never compared. A wrong secret surfaces when a page is
//! decrypted.

use crate::error::{MismatchField, StorageError, StorageResult};
use burrow_types::{EncryptionDescriptor, TableUri};

/// Accepted outcome of [`check_compatibility`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The table is used with its persisted descriptor.
    Unchanged,
    /// A plaintext table is opened with encryption: existing pages stay
    /// plaintext, new pages are encrypted with the requested encryptor.
    Upgrade,
}

/// Decides whether a table persisted with `persisted` may be opened with
/// `requested`. Performs no I/O.
pub fn check_compatibility(
    uri: &TableUri,
    persisted: &EncryptionDescriptor,
    requested: &EncryptionDescriptor,
) -> StorageResult<OpenOutcome> {
    use EncryptionDescriptor::{Named, None};

    let mismatch = |field, persisted: &str, requested: &str| StorageError::EncryptionMismatch {
        uri: uri.to_string(),
        field,
        persisted: persisted.to_string(),
        requested: requested.to_string(),
    };

    match (persisted, requested) {
        (None, None) => Ok(OpenOutcome::Unchanged),
        (None, Named { .. }) => Ok(OpenOutcome::Upgrade),
        (Named { name, .. }, None) => Err(mismatch(MismatchField::Name, name, requested.name())),
        (Named { name: pn, keyid: pk }, Named { name: rn, keyid: rk }) => {
            if pn != rn {
                Err(mismatch(MismatchField::Name, pn, rn))
            } else if pk != rk {
                Err(mismatch(MismatchField::Keyid, pk, rk))
            } else {
                Ok(OpenOutcome::Unchanged)
            }
        }
    }
}
