#![deny(missing_docs)]

//! Module to read KDBX 3 (Keepass 2) database files.
//!
//! The main types in this crate are:
//!
//! * [`Kdbx`] which represents a database file, locked or unlocked
//! * [`Entry`] which represents a password entry recovered from a database
//! * [`ProtectedValue`] which holds a field still encrypted in memory
//!
//! # Decoding a database
//!
//! [`decode`] takes the raw file bytes, a master password and optionally
//! the contents of a key file, and returns every entry together with the
//! header and the decrypted XML document.
//!
//! ```no_run
//! # fn main() -> Result<(), kdbx3_rs::Error> {
//! let bytes = std::fs::read("./passwords.kdbx")?;
//! let decoded = kdbx3_rs::decode(&bytes, "kdbxrs", None)?;
//! for entry in &decoded.entries {
//!     if let Some(password) = entry.password() {
//!         let password = decoded.decrypt_field(password)?;
//!         println!("{:?}: {}", entry.title(), password.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Protected fields are only decrypted when asked for, each one on its own,
//! with [`Decoded::decrypt_field`] or [`Kdbx::decrypt_field`].
//!
//! # Opening a database
//!
//! Databases can also be read with the [`kdbx3_rs::open`] function. This
//! provides access to header information. It can then be unlocked by
//! providing a [`CompositeKey`] to the [`Kdbx.unlock`] method to access any
//! encrypted data.
//!
//! ```no_run
//! # fn main() -> Result<(), kdbx3_rs::Error> {
//! use kdbx3_rs::CompositeKey;
//!
//! # let file_path = "./passwords.kdbx";
//! let kdbx = kdbx3_rs::open(file_path)?;
//! let key = CompositeKey::from_password("kdbxrs");
//! let unlocked = kdbx.unlock(&key)?;
//! println!("{} entries", unlocked.entries().len());
//! # Ok(())
//! # }
//! ```
//!
//! Alternatively, [`kdbx3_rs::from_reader`] can be used to open a database
//! from a non file source (such as in-memory or a network stream), and
//! [`pipeline::decode_async`] decodes from an asynchronous byte source.
//!
//! [`kdbx3_rs::from_reader`]: crate::from_reader
//! [`kdbx3_rs::open`]: crate::open
//! [`Kdbx.unlock`]: crate::Kdbx#method.unlock

pub mod binary;
pub mod crypto;
pub mod errors;
pub mod pipeline;
mod stream;
mod types;
mod utils;
pub mod xml;

pub use binary::{from_bytes, from_reader, open, FailedUnlock, Kdbx, UnlockOptions};
pub use crypto::{key_from_file_bytes, CompositeKey, KeyFileKey};
pub use errors::Error;
pub use pipeline::{decode_async, DatabaseSource, FileSource};
pub use stream::{decrypt_field, SALSA20_IV};
pub use types::{Decoded, Entry, ProtectedValue};

/// Decode a database from its raw bytes
///
/// `key_file` is the unprocessed content of the key file, if one is used.
pub fn decode(bytes: &[u8], password: &str, key_file: Option<&[u8]>) -> Result<Decoded, Error> {
    decode_with(bytes, password, key_file, &UnlockOptions::default())
}

/// As [`decode`], with unlock options
pub fn decode_with(
    bytes: &[u8],
    password: &str,
    key_file: Option<&[u8]>,
    options: &UnlockOptions,
) -> Result<Decoded, Error> {
    let kdbx = from_bytes(bytes)?;
    let key = CompositeKey::from_parts(password, key_file)?;
    let unlocked = kdbx.unlock_with(&key, options)?;
    Ok(unlocked.into_parts())
}
