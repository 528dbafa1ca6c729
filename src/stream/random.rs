use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use salsa20::Salsa20;
use thiserror::Error;
use zeroize::Zeroize;

use crate::binary::InnerStreamCipherAlgorithm;
use crate::crypto;
use crate::types::ProtectedValue;

/// Fixed nonce of the Salsa20 inner random stream
pub const SALSA20_IV: [u8; 8] = [0xe8, 0x30, 0x09, 0x4b, 0x97, 0x20, 0x5d, 0x2a];

#[derive(Debug, Error)]
/// Errors decrypting a single protected value
pub enum InnerStreamError {
    #[error("Unsupported inner stream type: {0:?}")]
    /// The cipher type is not supported by this library
    UnsupportedCipher(InnerStreamCipherAlgorithm),
    #[error("Database header has no protected stream key")]
    /// The header carried no key for the inner stream
    MissingKey,
    #[error("Protected value at offset {position} is not valid UTF-8")]
    /// The decrypted bytes are not text, usually a wrong stream key
    InvalidUtf8 {
        /// Offset of the value in the inner stream
        position: u64,
    },
}

impl InnerStreamCipherAlgorithm {
    pub(crate) fn stream_cipher(self, key: &[u8]) -> Result<Salsa20, InnerStreamError> {
        match self {
            InnerStreamCipherAlgorithm::Salsa20 => {
                let mut key = crypto::sha256(key);
                let cipher = Salsa20::new(&key.into(), &SALSA20_IV.into());
                key.zeroize();
                Ok(cipher)
            }
            _ => Err(InnerStreamError::UnsupportedCipher(self)),
        }
    }
}

/// Decrypt one protected value with the header's protected stream key
///
/// The keystream is positioned at the value's offset, so values can be
/// decrypted in any order and independently of each other.
pub fn decrypt_field(value: &ProtectedValue, stream_key: &[u8]) -> Result<String, InnerStreamError> {
    let position = value.position();
    let mut cipher = InnerStreamCipherAlgorithm::Salsa20.stream_cipher(stream_key)?;
    // the 64-bit block counter reaches past any u64 byte offset
    cipher.seek(position);
    let mut buffer = value.data().to_vec();
    cipher.apply_keystream(&mut buffer);

    String::from_utf8(buffer).map_err(|e| {
        e.into_bytes().zeroize();
        InnerStreamError::InvalidUtf8 { position }
    })
}
