//! Caller-supplied secret keys.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret supplied on every connection open and never persisted.
///
/// Zeroized on drop; `Debug` never prints the value.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(String);

impl SecretKey {
    /// Wraps a secret string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if no secret was supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SecretKey(<empty>)")
        } else {
            f.write_str("SecretKey([REDACTED])")
        }
    }
}
