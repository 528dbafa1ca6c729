use super::errors::{self, HeaderError, UnlockError};
use super::header::{self, OuterHeaderId};
use super::header_fields::{Cipher, CompressionType, InnerStreamCipherAlgorithm};
use crate::types::{Decoded, Entry, ProtectedValue};
use crate::{crypto, stream};
use std::fmt;
use tracing::{debug, instrument};

/// Lock state of a [`Kdbx`] archive
pub trait KdbxState: fmt::Debug {
    /// Unencrypted header of the archive
    fn header(&self) -> &header::KdbxHeader;
}

#[derive(Debug)]
/// A KeePass 2 archive in KDBX 3 format
///
/// Most methods are available on a specific state like `Kdbx<Locked>`
/// or `Kdbx<Unlocked>`.
///
/// An archive is obtained with [`kdbx3_rs::open`][crate::open],
/// [`kdbx3_rs::from_reader`][crate::from_reader] or
/// [`kdbx3_rs::from_bytes`][crate::from_bytes].
pub struct Kdbx<S>
where
    S: KdbxState,
{
    pub(super) state: S,
}

impl<T: KdbxState> Kdbx<T> {
    /// Encryption configuration read from the unencrypted header
    pub fn header(&self) -> &header::KdbxHeader {
        self.state.header()
    }

    /// Major archive version
    pub fn major_version(&self) -> u16 {
        self.state.header().major_version()
    }

    /// Minor archive version
    pub fn minor_version(&self) -> u16 {
        self.state.header().minor_version()
    }
}

/// Represents a failed attempt at unlocking a database
///
/// Includes the locked database and the reason the unlock failed.
/// This allows you to keep the database for interactive user and
/// e.g. promt the user for a new password if the error is key related
///
/// However, for unscripted use, `FailedUnlock` implements
/// `Into<[kdbx3_rs::Error]>` and `Into<[kdbx3_rs::errors::UnlockError]>`
/// for easy use with the `?` operatior.
#[derive(Debug)]
pub struct FailedUnlock(pub Kdbx<Locked>, pub errors::UnlockError);

impl From<FailedUnlock> for errors::UnlockError {
    fn from(funlock: FailedUnlock) -> errors::UnlockError {
        funlock.1
    }
}

/// Settings for unlocking a database
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnlockOptions {
    verify_block_hash: bool,
}

impl UnlockOptions {
    /// Check the SHA-256 stored with the payload block
    ///
    /// Off by default, the block hash is read but not compared.
    pub fn verify_block_hash(mut self, verify: bool) -> UnlockOptions {
        self.verify_block_hash = verify;
        self
    }

    /// Whether the payload block hash is checked
    pub fn verifies_block_hash(&self) -> bool {
        self.verify_block_hash
    }
}

#[derive(Debug, PartialEq, Eq)]
/// A locked kdbx file, use unlock(composite_key) to unlock
pub struct Locked {
    /// Header data of the kdbx archive, includes unencrypted metadata
    pub(crate) header: header::KdbxHeader,
    /// Encrypted vault data
    pub(crate) encrypted_data: Vec<u8>,
}

impl KdbxState for Locked {
    fn header(&self) -> &header::KdbxHeader {
        &self.header
    }
}

/// An unlocked kdbx file, allowing access to stored credentials
pub struct Unlocked {
    /// Header data of the kdbx archive, includes unencrypted metadata
    pub(crate) header: header::KdbxHeader,
    /// Entries outside history and the recycle bin
    pub(crate) entries: Vec<Entry>,
    /// Unencrypted XML document
    pub(crate) document: String,
}

impl fmt::Debug for Unlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unlocked")
            .field("header", &self.header)
            .field("entries", &self.entries.len())
            .field("document_len", &self.document.len())
            .finish()
    }
}

impl KdbxState for Unlocked {
    fn header(&self) -> &header::KdbxHeader {
        &self.header
    }
}

/// Header values needed to unlock, validated before any key work
struct UnlockParams<'a> {
    rounds: u32,
    master_seed: &'a [u8],
    transform_seed: &'a [u8],
    encryption_iv: &'a [u8],
    stream_start_bytes: &'a [u8],
    compression: CompressionType,
}

fn required(field: Option<&Vec<u8>>, id: OuterHeaderId) -> Result<&[u8], UnlockError> {
    field
        .map(Vec::as_slice)
        .ok_or(UnlockError::MissingRequiredField(id))
}

impl Kdbx<Locked> {
    /// Encrypted payload following the header
    pub fn encrypted_data(&self) -> &[u8] {
        &self.state.encrypted_data
    }

    fn unlock_params(&self) -> Result<UnlockParams<'_>, UnlockError> {
        let header = &self.state.header;
        match header.inner_stream_cipher {
            Some(InnerStreamCipherAlgorithm::Salsa20) => {}
            other => return Err(UnlockError::UnsupportedInnerStream(other)),
        }
        let rounds = header
            .transform_rounds
            .ok_or(UnlockError::MissingRequiredField(
                OuterHeaderId::LegacyTransformRounds,
            ))?;
        let rounds = rounds
            .supported()
            .ok_or(UnlockError::UnsupportedKeyRounds { high: rounds.high })?;
        match header.cipher {
            None | Some(Cipher::Aes256) => {}
            Some(other) => return Err(UnlockError::UnsupportedCipher(other)),
        }

        Ok(UnlockParams {
            rounds,
            master_seed: required(header.master_seed.as_ref(), OuterHeaderId::MasterSeed)?,
            transform_seed: required(
                header.transform_seed.as_ref(),
                OuterHeaderId::LegacyTransformSeed,
            )?,
            encryption_iv: required(header.encryption_iv.as_ref(), OuterHeaderId::EncryptionIv)?,
            stream_start_bytes: required(
                header.stream_start_bytes.as_ref(),
                OuterHeaderId::StreamStartBytes,
            )?,
            compression: header.compression_type,
        })
    }

    fn decrypt_payload(
        &self,
        params: &UnlockParams<'_>,
        cipher_key: &crypto::CipherKey,
        options: &UnlockOptions,
    ) -> Result<(Vec<Entry>, String), UnlockError> {
        let plaintext = stream::decrypt_cbc(
            cipher_key,
            params.encryption_iv,
            &self.state.encrypted_data,
        )
        .map_err(|e| match e {
            stream::BlockCipherError::InvalidIvLength(_) => UnlockError::InvalidHeader(
                HeaderError::MalformedField(OuterHeaderId::EncryptionIv, e.to_string()),
            ),
            stream::BlockCipherError::Unpad => UnlockError::IntegrityCheckFailed,
        })?;
        let document = stream::kdbx3_read_payload(
            &plaintext,
            params.stream_start_bytes,
            params.compression,
            options.verify_block_hash,
        )?;
        let entries = crate::xml::parse_xml(document.as_bytes())?;
        Ok((entries, document))
    }

    fn try_unlock(
        &self,
        key: &crypto::CompositeKey,
        options: &UnlockOptions,
    ) -> Result<(Vec<Entry>, String), UnlockError> {
        let params = self.unlock_params()?;
        debug!(rounds = params.rounds, "deriving cipher key");
        let cipher_key = key
            .composed()
            .transform(params.transform_seed, params.rounds)?
            .cipher_key(params.master_seed);
        self.decrypt_payload(&params, &cipher_key, options)
    }

    async fn try_unlock_async(
        &self,
        key: &crypto::CompositeKey,
        options: &UnlockOptions,
    ) -> Result<(Vec<Entry>, String), UnlockError> {
        let params = self.unlock_params()?;
        debug!(rounds = params.rounds, "deriving cipher key");
        let cipher_key = key
            .composed()
            .transform_async(params.transform_seed, params.rounds)
            .await?
            .cipher_key(params.master_seed);
        self.decrypt_payload(&params, &cipher_key, options)
    }

    fn finish_unlock(
        self,
        result: Result<(Vec<Entry>, String), UnlockError>,
    ) -> Result<Kdbx<Unlocked>, FailedUnlock> {
        match result {
            Ok((entries, document)) => Ok(Kdbx {
                state: Unlocked {
                    header: self.state.header,
                    entries,
                    document,
                },
            }),
            Err(e) => Err(FailedUnlock(self, e)),
        }
    }

    /// Unlocks the kdbx file
    ///
    /// If unlock fails, returns the locked kdbx file along with the error
    pub fn unlock(self, key: &crypto::CompositeKey) -> Result<Kdbx<Unlocked>, FailedUnlock> {
        self.unlock_with(key, &UnlockOptions::default())
    }

    /// Unlocks the kdbx file with the given options
    #[instrument(skip_all)]
    pub fn unlock_with(
        self,
        key: &crypto::CompositeKey,
        options: &UnlockOptions,
    ) -> Result<Kdbx<Unlocked>, FailedUnlock> {
        let result = self.try_unlock(key, options);
        self.finish_unlock(result)
    }

    /// Unlocks the kdbx file, running the key transformation on the
    /// tokio blocking pool
    #[instrument(skip_all)]
    pub async fn unlock_async(
        self,
        key: &crypto::CompositeKey,
        options: &UnlockOptions,
    ) -> Result<Kdbx<Unlocked>, FailedUnlock> {
        let result = self.try_unlock_async(key, options).await;
        self.finish_unlock(result)
    }
}

impl Kdbx<Unlocked> {
    /// Entries outside history and the recycle bin, in document order
    pub fn entries(&self) -> &[Entry] {
        &self.state.entries
    }

    /// Decrypted XML document
    pub fn document(&self) -> &str {
        &self.state.document
    }

    /// Decrypt a protected value from one of this database's entries
    pub fn decrypt_field(&self, value: &ProtectedValue) -> Result<String, stream::InnerStreamError> {
        let stream_key = self
            .header()
            .protected_stream_key
            .as_deref()
            .ok_or(stream::InnerStreamError::MissingKey)?;
        stream::decrypt_field(value, stream_key)
    }

    /// Split into entries, header and document
    pub fn into_parts(self) -> Decoded {
        Decoded {
            entries: self.state.entries,
            header: self.state.header,
            document: self.state.document,
        }
    }
}
