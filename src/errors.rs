//! Error types for kdbx3-rs

pub use crate::binary::errors::{HeaderError, OpenError, UnlockError};
pub use crate::crypto::{KeyFileError, KeyGenerationError};
pub use crate::stream::InnerStreamError;
pub use crate::xml::parse::Error as XmlError;
use crate::binary::FailedUnlock;
use thiserror::Error;

#[derive(Error, Debug)]
/// Wrapper error type for this library
pub enum Error {
    /// Failed to open a database
    #[error("Could not open database: {0}")]
    Open(#[from] OpenError),
    /// Failed unlocking a database
    #[error("Could not unlock database: {0}")]
    Unlock(#[from] UnlockError),
    /// Failed reading the key file
    #[error("Could not read key file: {0}")]
    KeyFile(#[from] KeyFileError),
    /// Failed parsing database XML
    #[error("Failed to parse database XML: {0}")]
    Xml(#[from] XmlError),
    /// Failed decrypting a protected value
    #[error("Could not decrypt protected value: {0}")]
    InnerStream(#[from] InnerStreamError),
    /// Failed reading the database from its source
    #[error("Could not read database: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FailedUnlock> for Error {
    fn from(funlock: FailedUnlock) -> Error {
        Error::Unlock(funlock.1)
    }
}
