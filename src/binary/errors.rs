use super::header;
use super::header_fields::{Cipher, InnerStreamCipherAlgorithm};
use crate::crypto;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
/// Errors encountered loading a database prior to decryption
pub enum OpenError {
    /// Keepass database magic numbers missing
    #[error("Unsupported file type - not a keepass database (signature {signature1:#010x} {signature2:#010x})")]
    SignatureMismatch {
        /// First signature word found in the file
        signature1: u32,
        /// Second signature word found in the file
        signature2: u32,
    },
    /// The KDBX version is newer than v3
    #[error("Unsupported kdbx version {0}")]
    UnsupportedMajorVersion(u16),
    /// There was some error parsing the unencrypted database header
    #[error("Error reading database header - {0}")]
    MalformedHeader(#[from] HeaderError),
    /// Error encountered reading database
    #[error("IO error reading file - {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
/// Errors encountered unlocking a encrypted database
pub enum UnlockError {
    /// Protected values use a stream cipher other than Salsa20
    #[error("Unsupported inner stream cipher {0:?} - only Salsa20 is supported")]
    UnsupportedInnerStream(Option<InnerStreamCipherAlgorithm>),
    /// The key transformation round count does not fit in 32 bits
    #[error("Unsupported key transformation rounds - high word {high} must be zero")]
    UnsupportedKeyRounds {
        /// High 32 bits of the round count
        high: u32,
    },
    /// The database is encrypted with a cipher other than AES 256
    #[error("Incompatible database - Unsupported cipher {0:?}")]
    UnsupportedCipher(Cipher),
    /// A field needed to unlock the database is missing from the header
    #[error("Incompatible database - Missing required field of type {0:?}")]
    MissingRequiredField(header::OuterHeaderId),
    /// A header field has the wrong size for its use
    #[error("Invalid header - {0}")]
    InvalidHeader(#[from] HeaderError),
    /// There was some error generating the keys
    #[error("Key generation failed - {0}")]
    KeyGen(#[from] crypto::KeyGenerationError),
    /// The decrypted stream start bytes do not match the header.
    /// This indicates an invalid password or key file, or a corrupt database
    #[error("Integrity check failed - wrong password or corrupt database")]
    IntegrityCheckFailed,
    /// The first payload block runs past the decrypted data or fails its hash
    #[error("Corrupt database - {0}")]
    CorruptBlock(String),
    /// The payload could not be decompressed
    #[error("Decompression failed - {0}")]
    Decompress(io::Error),
    /// The decrypted payload is not UTF-8 text
    #[error("Corrupt database - payload is not valid UTF-8")]
    InvalidUtf8,
    /// The decrypted XML document is invalid
    #[error("Corrupt database. XML data is invalid - {0}")]
    InvalidXml(#[from] crate::errors::XmlError),
}

#[derive(Debug, Error)]
/// Errors uncountering validating the database header
pub enum HeaderError {
    /// The data ended before the header was entirely read
    #[error("Unexpected end of data in database header")]
    Truncated,
    /// The reader failed before the header was entirely read
    #[error("Error reading database header - {0}")]
    Io(io::Error),
    /// A supported field had an unexpected format
    #[error("Incompatible database - Malformed field of type {0:?}: {1}")]
    MalformedField(header::OuterHeaderId, String),
}

impl From<io::Error> for HeaderError {
    fn from(e: io::Error) -> HeaderError {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => HeaderError::Truncated,
            _ => HeaderError::Io(e),
        }
    }
}
