//! Page codec: the boundary between page images and on-disk frames.
//!
//! Every page written to a block file is framed as
//!
//! ```text
//! [codec: u8][plaintext length: u32 LE][payload]
//! ```
//!
//! where codec `0` means the payload is the plaintext and codec `1` means the
//! payload is encryptor output. Frames are self-describing, so a table that
//! was upgraded from no encryption keeps reading its old plaintext frames
//! while new frames are encrypted. Whether a plaintext frame is acceptable
//! at all is decided by the table, not here.

use burrow_crypto::Encryptor;
use thiserror::Error;

/// Bytes of framing in front of every payload.
pub const FRAME_HEADER_SIZE: usize = 5;

const CODEC_PLAIN: u8 = 0;
const CODEC_ENCRYPTED: u8 = 1;

/// Failure of a single page encode or decode. The caller attaches the page
/// location when converting it into a [`crate::StorageError`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("{0}")]
    Encryption(String),

    #[error("{0}")]
    Decryption(String),

    #[error("{0}")]
    Corrupt(String),
}

impl CodecError {
    pub(crate) fn at(self, location: impl Into<String>) -> crate::StorageError {
        let location = location.into();
        match self {
            Self::Encryption(reason) => crate::StorageError::Encryption { location, reason },
            Self::Decryption(reason) => crate::StorageError::Decryption { location, reason },
            Self::Corrupt(reason) => crate::StorageError::Corruption { location, reason },
        }
    }
}

/// Frames a page image, encrypting it unless `encryptor` is the identity.
pub fn encode_page(plaintext: &[u8], encryptor: &dyn Encryptor) -> Result<Vec<u8>, CodecError> {
    let len = u32::try_from(plaintext.len()).map_err(|_| {
        CodecError::Encryption(format!("page of {} bytes is too large", plaintext.len()))
    })?;

    if encryptor.is_identity() {
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + plaintext.len());
        frame.push(CODEC_PLAIN);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(plaintext);
        return Ok(frame);
    }

    let payload = encryptor
        .encrypt(plaintext)
        .map_err(|e| CodecError::Encryption(e.to_string()))?;
    let limit = plaintext.len() + encryptor.sizing();
    if payload.len() > limit {
        return Err(CodecError::Encryption(format!(
            "encryptor '{}' produced {} bytes for a {}-byte page, above its declared limit of {}",
            encryptor.name(),
            payload.len(),
            plaintext.len(),
            limit
        )));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.push(CODEC_ENCRYPTED);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Recovers a page image from a frame.
///
/// Plaintext frames decode with any encryptor. Encrypted frames need a
/// non-identity encryptor, and the decrypted length must match the length
/// recorded in the frame.
pub fn decode_page(frame: &[u8], encryptor: &dyn Encryptor) -> Result<Vec<u8>, CodecError> {
    if frame.len() < FRAME_HEADER_SIZE {
        return Err(CodecError::Decryption(format!(
            "truncated frame of {} bytes",
            frame.len()
        )));
    }
    let codec = frame[0];
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&frame[1..FRAME_HEADER_SIZE]);
    let expected = u32::from_le_bytes(len_bytes) as usize;
    let payload = &frame[FRAME_HEADER_SIZE..];

    match codec {
        CODEC_PLAIN => {
            if payload.len() != expected {
                return Err(CodecError::Corrupt(format!(
                    "plaintext frame holds {} bytes, header records {expected}",
                    payload.len()
                )));
            }
            Ok(payload.to_vec())
        }
        CODEC_ENCRYPTED => {
            if encryptor.is_identity() {
                return Err(CodecError::Decryption(
                    "page is encrypted but the table has no encryptor".to_string(),
                ));
            }
            let plaintext = encryptor
                .decrypt(payload)
                .map_err(|e| CodecError::Decryption(e.to_string()))?;
            if plaintext.len() != expected {
                return Err(CodecError::Decryption(format!(
                    "decrypted {} bytes, frame records {expected}",
                    plaintext.len()
                )));
            }
            Ok(plaintext)
        }
        other => Err(CodecError::Corrupt(format!("unknown page codec {other}"))),
    }
}

/// True if the frame carries encrypted payload.
pub fn is_encrypted(frame: &[u8]) -> bool {
    frame.first() == Some(&CODEC_ENCRYPTED)
}
