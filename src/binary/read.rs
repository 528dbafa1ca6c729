use super::header_fields::{KDBX_MAGIC_NUMBER, KEEPASS_MAGIC_NUMBER};
use super::{errors, header, Kdbx, Locked};
use crate::utils;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, instrument};

const MAX_MAJOR_VERSION: u16 = 3;

/// Read a database from a input stream
///
/// The database starts locked, use [`Kdbx.unlock`] to unlock
///
/// [`Kdbx.unlock`]: crate::Kdbx#method.unlock
#[instrument(skip_all)]
pub fn from_reader<R: Read>(mut input: R) -> Result<Kdbx<Locked>, errors::OpenError> {
    let mut prefix = [0u8; header::HEADER_PREFIX_LEN];
    input
        .read_exact(&mut prefix)
        .map_err(errors::HeaderError::from)?;

    let signature1 = utils::le_u32(&prefix, 0).unwrap_or_default();
    let signature2 = utils::le_u32(&prefix, 4).unwrap_or_default();
    if signature1 != KEEPASS_MAGIC_NUMBER || signature2 != KDBX_MAGIC_NUMBER {
        return Err(errors::OpenError::SignatureMismatch {
            signature1,
            signature2,
        });
    }

    let version = utils::le_u32(&prefix, 8).unwrap_or_default();
    let major_version = (version >> 16) as u16;
    if major_version > MAX_MAJOR_VERSION {
        return Err(errors::OpenError::UnsupportedMajorVersion(major_version));
    }

    let header = header::KdbxHeader::read(&mut input, version)?;
    let mut encrypted_data = Vec::new();
    input.read_to_end(&mut encrypted_data)?;
    debug!(
        major = header.major_version(),
        minor = header.minor_version(),
        unknown_fields = header.other_headers.len(),
        data_start = header.data_start,
        encrypted_len = encrypted_data.len(),
        "read database header"
    );

    Ok(Kdbx {
        state: Locked {
            header,
            encrypted_data,
        },
    })
}

/// Read a database from raw file bytes
pub fn from_bytes(bytes: &[u8]) -> Result<Kdbx<Locked>, errors::OpenError> {
    from_reader(bytes)
}

/// Read a database from a given path
///
/// The database starts locked, use [`Kdbx.unlock`] to unlock
///
/// [`Kdbx.unlock`]: crate::Kdbx#method.unlock
pub fn open<P: AsRef<Path>>(path: P) -> Result<Kdbx<Locked>, errors::OpenError> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    from_reader(&mut file)
}
