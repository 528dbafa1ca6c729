//! Decryption of the database payload and of protected values

mod block_cipher;
mod kdbx3;
pub(crate) mod random;

pub(crate) use block_cipher::{decrypt_cbc, BlockCipherError};
pub(crate) use kdbx3::kdbx3_read_payload;
pub use random::{decrypt_field, InnerStreamError, SALSA20_IV};
