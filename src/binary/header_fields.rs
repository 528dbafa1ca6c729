use super::errors::HeaderError;
use super::header::{HeaderField, OuterHeaderId};
use crate::utils;
use std::convert::TryFrom;

/// First signature word of every KeePass database
pub const KEEPASS_MAGIC_NUMBER: u32 = 0x9AA2_D903;
/// Second signature word, identifying the KDBX format
pub const KDBX_MAGIC_NUMBER: u32 = 0xB54B_FB67;

const AES128_UUID: &str = "61ab05a1-9464-41c3-8d74-3a563df8dd35";
const AES256_UUID: &str = "31c1f2e6-bf71-4350-be58-05216afc5aff";
const TWOFISH_UUID: &str = "ad68f29f-576f-4bb9-a36a-d47af965346c";
const CHACHA20_UUID: &str = "d6038a2b-8b6f-4cb5-a524-339a31dbb59a";
const COMPRESSION_TYPE_NONE: u32 = 0;
const COMPRESSION_TYPE_GZIP: u32 = 1;

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
/// Encryption cipher used for decryption the main database data
pub enum Cipher {
    /// AES 128 in CBC mode
    Aes128,
    /// AES 256 in CBC mode
    Aes256,
    /// TwoFish in CBC mode
    TwoFish,
    /// ChaCha20 in streaming mode
    ChaCha20,
    /// Cipher unknown to this library
    Unknown(uuid::Uuid),
}

const CIPHER_TABLE: [(&str, Cipher); 4] = [
    (AES128_UUID, Cipher::Aes128),
    (AES256_UUID, Cipher::Aes256),
    (TWOFISH_UUID, Cipher::TwoFish),
    (CHACHA20_UUID, Cipher::ChaCha20),
];

impl From<uuid::Uuid> for Cipher {
    fn from(uuid: uuid::Uuid) -> Cipher {
        utils::value_from_uuid_table(&CIPHER_TABLE, uuid).unwrap_or(Cipher::Unknown(uuid))
    }
}

impl TryFrom<&HeaderField<OuterHeaderId>> for Cipher {
    type Error = HeaderError;

    fn try_from(field: &HeaderField<OuterHeaderId>) -> Result<Cipher, HeaderError> {
        uuid::Uuid::from_slice(&field.data)
            .map(Cipher::from)
            .map_err(|_| HeaderError::MalformedField(field.ty, "Cipher UUID not valid".into()))
    }
}

/// Inner stream cipher identifier used for encrypting protected fields
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InnerStreamCipherAlgorithm {
    /// ArcFour algorithm
    ArcFour,
    /// Salsa20 stream cipher
    Salsa20,
    /// ChaCha20 stream cipher
    ChaCha20,
    /// Unknown stream cipher
    Unknown(u32),
}

impl From<u32> for InnerStreamCipherAlgorithm {
    fn from(id: u32) -> InnerStreamCipherAlgorithm {
        match id {
            1 => InnerStreamCipherAlgorithm::ArcFour,
            2 => InnerStreamCipherAlgorithm::Salsa20,
            3 => InnerStreamCipherAlgorithm::ChaCha20,
            x => InnerStreamCipherAlgorithm::Unknown(x),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// Compression method used prior to encryption
pub enum CompressionType {
    /// The encrypted data is uncompressed
    None,
    /// The encrypted data uses gzip compression
    Gzip,
    /// The crypted data uses a compression method unsupported by this library
    Unknown(u32),
}

impl Default for CompressionType {
    fn default() -> CompressionType {
        CompressionType::None
    }
}

impl From<u32> for CompressionType {
    fn from(id: u32) -> CompressionType {
        match id {
            COMPRESSION_TYPE_NONE => CompressionType::None,
            COMPRESSION_TYPE_GZIP => CompressionType::Gzip,
            _ => CompressionType::Unknown(id),
        }
    }
}

/// Rounds of AES used to transform the composite key
///
/// Stored on disk as a 64 bit little endian integer. Only the low
/// 32 bits are supported, a database with a non zero high word
/// can not be unlocked.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TransformRounds {
    /// Low 32 bits of the round count
    pub low: u32,
    /// High 32 bits of the round count, must be zero
    pub high: u32,
}

impl TransformRounds {
    /// The full 64 bit round count
    pub fn total(&self) -> u64 {
        (u64::from(self.high) << 32) | u64::from(self.low)
    }

    /// Round count usable for key transformation, if supported
    pub fn supported(&self) -> Option<u32> {
        if self.high == 0 {
            Some(self.low)
        } else {
            None
        }
    }
}

impl TryFrom<&HeaderField<OuterHeaderId>> for TransformRounds {
    type Error = HeaderError;

    fn try_from(field: &HeaderField<OuterHeaderId>) -> Result<TransformRounds, HeaderError> {
        let low = field.le_u32_at(0).ok_or_else(|| {
            HeaderError::MalformedField(field.ty, "Round count shorter than 8 bytes".into())
        })?;
        let high = field.le_u32_at(4).ok_or_else(|| {
            HeaderError::MalformedField(field.ty, "Round count shorter than 8 bytes".into())
        })?;
        Ok(TransformRounds { low, high })
    }
}
