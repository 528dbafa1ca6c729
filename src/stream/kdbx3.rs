use crate::binary::errors::UnlockError;
use crate::binary::CompressionType;
use crate::{crypto, utils};
use std::io::Read;
use tracing::{debug, instrument, warn};

const STREAM_START_LEN: usize = 32;
const BLOCK_ID_LEN: usize = 4;
const BLOCK_HASH_LEN: usize = 32;
const BLOCK_HEADER_LEN: usize = BLOCK_ID_LEN + BLOCK_HASH_LEN + 4;

/// A hashed block from the decrypted payload
pub(crate) struct HashedBlock<'a> {
    pub(crate) id: u32,
    pub(crate) hash: &'a [u8],
    pub(crate) data: &'a [u8],
}

impl<'a> HashedBlock<'a> {
    /// Read the block at the start of `input`: id, SHA-256 and length
    /// followed by the block data
    pub(crate) fn parse(input: &'a [u8]) -> Result<HashedBlock<'a>, UnlockError> {
        let header = input.get(..BLOCK_HEADER_LEN).ok_or_else(|| {
            UnlockError::CorruptBlock(format!(
                "Block header needs {} bytes, {} available",
                BLOCK_HEADER_LEN,
                input.len()
            ))
        })?;
        let id = utils::le_u32(header, 0).unwrap_or_default();
        let hash = &header[BLOCK_ID_LEN..BLOCK_ID_LEN + BLOCK_HASH_LEN];
        let len = utils::le_u32(header, BLOCK_ID_LEN + BLOCK_HASH_LEN).unwrap_or_default() as usize;
        let data = BLOCK_HEADER_LEN
            .checked_add(len)
            .and_then(|end| input.get(BLOCK_HEADER_LEN..end))
            .ok_or_else(|| {
                UnlockError::CorruptBlock(format!(
                    "Block {} declares {} bytes, {} available",
                    id,
                    len,
                    input.len() - BLOCK_HEADER_LEN
                ))
            })?;

        Ok(HashedBlock { id, hash, data })
    }

    pub(crate) fn verify(&self) -> bool {
        crypto::verify_sha256(self.data, self.hash)
    }
}

/// Turn decrypted payload bytes into the XML document text
///
/// Checks the stream start bytes, then reads the first hashed block and
/// decompresses it if required. Blocks after the first are not read.
#[instrument(skip_all, fields(compression = ?compression))]
pub(crate) fn kdbx3_read_payload(
    plaintext: &[u8],
    stream_start_bytes: &[u8],
    compression: CompressionType,
    verify_block_hash: bool,
) -> Result<String, UnlockError> {
    if plaintext.get(..STREAM_START_LEN) != Some(stream_start_bytes) {
        return Err(UnlockError::IntegrityCheckFailed);
    }

    let block = HashedBlock::parse(&plaintext[STREAM_START_LEN..])?;
    debug!(block_id = block.id, len = block.data.len(), "read first payload block");
    if verify_block_hash && !block.verify() {
        return Err(UnlockError::CorruptBlock(format!(
            "Block {} failed hash verification",
            block.id
        )));
    }

    let xml_bytes = match compression {
        CompressionType::Gzip => {
            let mut decoder =
                libflate::gzip::Decoder::new(block.data).map_err(UnlockError::Decompress)?;
            let mut output = Vec::new();
            decoder
                .read_to_end(&mut output)
                .map_err(UnlockError::Decompress)?;
            output
        }
        CompressionType::None => block.data.to_vec(),
        CompressionType::Unknown(flags) => {
            warn!(flags, "unknown compression flags, using payload as is");
            block.data.to_vec()
        }
    };

    String::from_utf8(xml_bytes).map_err(|_| UnlockError::InvalidUtf8)
}
