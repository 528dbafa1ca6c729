//! Asynchronous decoding from a byte source
//!
//! [`decode_async`] runs the whole decode as a chain of suspension points:
//! fetch the bytes, read the header, derive the composite key, transform it
//! with both halves on the blocking pool, then decrypt and extract entries.
//! Dropping the returned future abandons the decode without side effects.

use crate::binary::{self, UnlockOptions};
use crate::crypto::CompositeKey;
use crate::errors::Error;
use crate::types::Decoded;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Something that can produce the raw bytes of a database
pub trait DatabaseSource {
    /// Fetch the complete database file
    fn database_bytes(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

impl DatabaseSource for Vec<u8> {
    fn database_bytes(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        let bytes = self.clone();
        async move { Ok(bytes) }
    }
}

/// A database stored at a filesystem path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Read the database at `path` when decoded
    pub fn new<P: Into<PathBuf>>(path: P) -> FileSource {
        FileSource { path: path.into() }
    }

    /// Location of the database
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatabaseSource for FileSource {
    fn database_bytes(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        tokio::fs::read(&self.path)
    }
}

/// Fetch, unlock and extract a database from `source`
///
/// Requires a tokio runtime with the blocking pool available.
pub async fn decode_async<S>(
    source: &S,
    password: &str,
    key_file: Option<&[u8]>,
) -> Result<Decoded, Error>
where
    S: DatabaseSource + ?Sized,
{
    decode_async_with(source, password, key_file, &UnlockOptions::default()).await
}

/// As [`decode_async`], with unlock options
#[instrument(skip_all)]
pub async fn decode_async_with<S>(
    source: &S,
    password: &str,
    key_file: Option<&[u8]>,
    options: &UnlockOptions,
) -> Result<Decoded, Error>
where
    S: DatabaseSource + ?Sized,
{
    let bytes = source.database_bytes().await?;
    debug!(len = bytes.len(), "fetched database bytes");
    let kdbx = binary::from_bytes(&bytes)?;
    let key = CompositeKey::from_parts(password, key_file)?;
    let unlocked = kdbx.unlock_async(&key, options).await?;
    Ok(unlocked.into_parts())
}
