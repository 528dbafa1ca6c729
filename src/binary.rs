//! .kdbx files and the outer binary format

pub(crate) mod errors;
mod header;
mod header_fields;
mod kdbx;
mod read;

pub use header::{HeaderField, KdbxHeader, OuterHeaderId, HEADER_PREFIX_LEN};
pub use header_fields::{
    Cipher, CompressionType, InnerStreamCipherAlgorithm, TransformRounds, KDBX_MAGIC_NUMBER,
    KEEPASS_MAGIC_NUMBER,
};
pub use kdbx::{FailedUnlock, Kdbx, KdbxState, Locked, UnlockOptions, Unlocked};
pub use read::{from_bytes, from_reader, open};
