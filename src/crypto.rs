//! Converting user credentials into the database cipher key
//!
//! The chain is: [`CompositeKey`] (password and key file) is hashed into a
//! [`ComposedKey`], which is run through the AES key transformation into a
//! [`TransformedKey`], which is finally hashed with the database master seed
//! into the [`CipherKey`] used to decrypt the payload.

mod key_file;

pub use key_file::{key_from_file_bytes, KeyFileError, KeyFileKey};

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size in bytes of every key in the derivation chain
pub const KEY_SIZE: usize = 32;
const HALF_KEY_SIZE: usize = KEY_SIZE / 2;

#[derive(Debug, Error)]
/// Errors encountered deriving keys from credentials
pub enum KeyGenerationError {
    /// The transform seed is not a valid AES 256 key
    #[error("Transform seed must be 32 bytes, found {0}")]
    InvalidTransformSeed(usize),
    /// A background key transformation task did not complete
    #[error("Key transformation task failed: {0}")]
    TransformTask(String),
}

pub(crate) fn sha256(data: &[u8]) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

pub(crate) fn verify_sha256(data: &[u8], expected: &[u8]) -> bool {
    Sha256::digest(data).as_slice() == expected
}

macro_rules! secret_key {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
        pub struct $name([u8; KEY_SIZE]);

        impl $name {
            /// Raw key bytes
            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&"[REDACTED]").finish()
            }
        }
    };
}

secret_key!(
    /// SHA-256 of the concatenated credential parts
    ComposedKey
);
secret_key!(
    /// Composed key after the AES transformation rounds
    TransformedKey
);
secret_key!(
    /// Key used to initialise the payload cipher
    CipherKey
);

/// Credentials needed to unlock the database
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct CompositeKey {
    pw: Option<String>,
    key_file: Option<KeyFileKey>,
}

impl fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeKey")
            .field("pw", &self.pw.as_ref().map(|_| "[REDACTED]"))
            .field("key_file", &self.key_file)
            .finish()
    }
}

impl CompositeKey {
    /// Create a new composite key
    pub fn new(pw: Option<String>, key_file: Option<KeyFileKey>) -> CompositeKey {
        CompositeKey { pw, key_file }
    }

    /// Utility method for making a key with just a password
    pub fn from_password(pw: &str) -> CompositeKey {
        Self::new(Some(pw.into()), None)
    }

    /// Create a key from a password and the raw contents of a key file
    pub fn with_key_file(pw: &str, key_file_bytes: &[u8]) -> Result<CompositeKey, KeyFileError> {
        Ok(Self::new(
            Some(pw.into()),
            Some(key_from_file_bytes(key_file_bytes)?),
        ))
    }

    /// Create a key from a password and key file contents if one was supplied
    pub fn from_parts(pw: &str, key_file_bytes: Option<&[u8]>) -> Result<CompositeKey, KeyFileError> {
        match key_file_bytes {
            Some(bytes) => Self::with_key_file(pw, bytes),
            None => Ok(Self::from_password(pw)),
        }
    }

    pub(crate) fn composed(&self) -> ComposedKey {
        derive_composite_key(self.pw.as_deref().unwrap_or(""), self.key_file.as_ref())
    }
}

/// Hash the credential parts into a single 32 byte key
///
/// The password is included whenever it is non-empty, or when there is
/// no key file, so that a blank password alone still yields a key.
pub fn derive_composite_key(password: &str, key_file: Option<&KeyFileKey>) -> ComposedKey {
    let mut buffer = Zeroizing::new(Vec::with_capacity(KEY_SIZE * 2));
    if !password.is_empty() || key_file.is_none() {
        buffer.extend_from_slice(&sha256(password.as_bytes()));
    }
    if let Some(key) = key_file {
        buffer.extend_from_slice(key.as_bytes());
    }

    ComposedKey(sha256(&buffer))
}

fn transform_cipher(seed: &[u8]) -> Result<Aes256, KeyGenerationError> {
    Aes256::new_from_slice(seed).map_err(|_| KeyGenerationError::InvalidTransformSeed(seed.len()))
}

/// Rounds run between checks of the cancellation flag
const CANCEL_CHECK_ROUNDS: u32 = 1 << 16;

type KeyHalf = Zeroizing<[u8; HALF_KEY_SIZE]>;

/// Encrypt `block` in place `rounds` times
///
/// Returns `false` if `cancel` was raised before every round ran.
fn transform_half(cipher: &Aes256, block: &mut KeyHalf, rounds: u32, cancel: &AtomicBool) -> bool {
    let block = GenericArray::from_mut_slice(&mut block[..]);
    let mut remaining = rounds;
    while remaining > 0 {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let batch = remaining.min(CANCEL_CHECK_ROUNDS);
        for _ in 0..batch {
            cipher.encrypt_block(block);
        }
        remaining -= batch;
    }
    true
}

fn split_halves(key: &ComposedKey) -> (KeyHalf, KeyHalf) {
    let mut left = Zeroizing::new([0u8; HALF_KEY_SIZE]);
    let mut right = Zeroizing::new([0u8; HALF_KEY_SIZE]);
    left.copy_from_slice(&key.0[..HALF_KEY_SIZE]);
    right.copy_from_slice(&key.0[HALF_KEY_SIZE..]);
    (left, right)
}

fn join_halves(left: &KeyHalf, right: &KeyHalf) -> TransformedKey {
    let mut joined = [0u8; KEY_SIZE];
    joined[..HALF_KEY_SIZE].copy_from_slice(&left[..]);
    joined[HALF_KEY_SIZE..].copy_from_slice(&right[..]);
    TransformedKey(joined)
}

/// Raises the shared flag when the owning future is dropped
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Encrypt each 16 byte half of the composed key `rounds` times with AES 256
/// keyed by `seed`
pub fn transform_key(
    composed: &ComposedKey,
    seed: &[u8],
    rounds: u32,
) -> Result<TransformedKey, KeyGenerationError> {
    let cipher = transform_cipher(seed)?;
    let never = AtomicBool::new(false);
    let (mut left, mut right) = split_halves(composed);
    transform_half(&cipher, &mut left, rounds, &never);
    transform_half(&cipher, &mut right, rounds, &never);
    Ok(join_halves(&left, &right))
}

/// As [`transform_key`], running the two halves on the blocking thread pool
/// concurrently
///
/// Dropping the returned future stops both halves once their current
/// batch of rounds completes.
pub async fn transform_key_async(
    composed: &ComposedKey,
    seed: &[u8],
    rounds: u32,
) -> Result<TransformedKey, KeyGenerationError> {
    let left_cipher = transform_cipher(seed)?;
    let right_cipher = left_cipher.clone();
    let cancel = Arc::new(AtomicBool::new(false));
    let _guard = CancelOnDrop(Arc::clone(&cancel));
    let left_cancel = Arc::clone(&cancel);
    let right_cancel = cancel;
    let (mut left, mut right) = split_halves(composed);

    let left_task = tokio::task::spawn_blocking(move || {
        let done = transform_half(&left_cipher, &mut left, rounds, &left_cancel);
        (left, done)
    });
    let right_task = tokio::task::spawn_blocking(move || {
        let done = transform_half(&right_cipher, &mut right, rounds, &right_cancel);
        (right, done)
    });
    let ((left, left_done), (right, right_done)) = tokio::try_join!(left_task, right_task)
        .map_err(|e| KeyGenerationError::TransformTask(e.to_string()))?;
    if !(left_done && right_done) {
        return Err(KeyGenerationError::TransformTask(
            "key transformation was cancelled".into(),
        ));
    }
    Ok(join_halves(&left, &right))
}

/// SHA-256 of the master seed followed by SHA-256 of the transformed key
pub fn final_key(transformed: &TransformedKey, master_seed: &[u8]) -> CipherKey {
    let mut data_to_hash = Zeroizing::new(Vec::with_capacity(master_seed.len() + KEY_SIZE));
    data_to_hash.extend_from_slice(master_seed);
    data_to_hash.extend_from_slice(&sha256(&transformed.0));

    CipherKey(sha256(&data_to_hash))
}

impl ComposedKey {
    /// Apply the key transformation
    #[instrument(skip_all, fields(rounds))]
    pub fn transform(&self, seed: &[u8], rounds: u32) -> Result<TransformedKey, KeyGenerationError> {
        debug!("transforming composite key");
        transform_key(self, seed, rounds)
    }

    /// Apply the key transformation with both halves in parallel
    #[instrument(skip_all, fields(rounds))]
    pub async fn transform_async(
        &self,
        seed: &[u8],
        rounds: u32,
    ) -> Result<TransformedKey, KeyGenerationError> {
        debug!("transforming composite key on blocking pool");
        transform_key_async(self, seed, rounds).await
    }
}

impl TransformedKey {
    /// Obtain a key to initialise a cipher
    pub fn cipher_key(&self, master_seed: &[u8]) -> CipherKey {
        final_key(self, master_seed)
    }
}
