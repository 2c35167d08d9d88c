//! `rotn`: the reference cipher used by tests.
//!
//! Rotates ASCII letters by the keyid (`0..=25`). An optional secret key of
//! ASCII letters adds a per-position rotation (`a` = 0, `b` = 1, ...), cycled
//! over the payload. Every other byte passes through unchanged.
//!
//! Output is prefixed by a fixed 16-byte header standing in for an IV, so
//! ciphertext is longer than plaintext.
//!
//! This cipher has no integrity check: decrypting with the wrong rotation or
//! secret returns wrong bytes instead of an error. It exists to exercise the
//! engine's encryption plumbing and must not be used to protect data.

use crate::encryptor::{Encryptor, EncryptorFactory};
use crate::error::{CryptoError, CryptoResult};
use burrow_types::SecretKey;
use std::sync::Arc;

/// Registered name of the reference cipher.
pub const ROTN_ENCRYPTOR: &str = "rotn";

/// Pseudo-IV written in front of every payload.
pub const ROTN_HEADER: &[u8; 16] = b"rotn-pseudo-iv\0\0";

/// Factory for [`RotnEncryptor`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct RotnFactory;

impl EncryptorFactory for RotnFactory {
    fn customize(
        &self,
        keyid: &str,
        secretkey: Option<&SecretKey>,
    ) -> CryptoResult<Arc<dyn Encryptor>> {
        let rotation: u8 = keyid.parse().map_err(|_| CryptoError::InvalidKeyId {
            name: ROTN_ENCRYPTOR.to_string(),
            reason: format!("'{keyid}' is not a rotation count"),
        })?;
        if rotation > 25 {
            return Err(CryptoError::InvalidKeyId {
                name: ROTN_ENCRYPTOR.to_string(),
                reason: format!("rotation {rotation} is outside 0..=25"),
            });
        }

        let shifts = match secretkey {
            None => Vec::new(),
            Some(secret) => {
                if !secret.expose().bytes().all(|b| b.is_ascii_alphabetic()) {
                    return Err(CryptoError::InvalidSecretKey {
                        name: ROTN_ENCRYPTOR.to_string(),
                        reason: "only ASCII letters are allowed".to_string(),
                    });
                }
                secret
                    .expose()
                    .bytes()
                    .map(|b| b.to_ascii_lowercase() - b'a')
                    .collect()
            }
        };

        Ok(Arc::new(RotnEncryptor { rotation, shifts }))
    }
}

/// Letter-rotation encryptor.
#[derive(Clone)]
pub struct RotnEncryptor {
    rotation: u8,
    shifts: Vec<u8>,
}

impl RotnEncryptor {
    fn rotation_at(&self, index: usize) -> u8 {
        if self.shifts.is_empty() {
            self.rotation
        } else {
            (self.rotation + self.shifts[index % self.shifts.len()]) % 26
        }
    }
}

impl std::fmt::Debug for RotnEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotnEncryptor")
            .field("rotation", &self.rotation)
            .field("secret", &!self.shifts.is_empty())
            .finish()
    }
}

fn rotate(byte: u8, by: u8) -> u8 {
    let base = match byte {
        b'a'..=b'z' => b'a',
        b'A'..=b'Z' => b'A',
        _ => return byte,
    };
    (byte - base + by) % 26 + base
}

impl Encryptor for RotnEncryptor {
    fn name(&self) -> &str {
        ROTN_ENCRYPTOR
    }

    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut out = Vec::with_capacity(ROTN_HEADER.len() + plaintext.len());
        out.extend_from_slice(ROTN_HEADER);
        out.extend(
            plaintext
                .iter()
                .enumerate()
                .map(|(i, &b)| rotate(b, self.rotation_at(i))),
        );
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let body = ciphertext
            .strip_prefix(ROTN_HEADER.as_slice())
            .ok_or_else(|| CryptoError::Decryption("missing rotn header".to_string()))?;
        Ok(body
            .iter()
            .enumerate()
            .map(|(i, &b)| rotate(b, 26 - self.rotation_at(i)))
            .collect())
    }

    fn sizing(&self) -> usize {
        ROTN_HEADER.len()
    }
}
