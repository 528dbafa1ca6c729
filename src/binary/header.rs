use super::errors::HeaderError as Error;
use super::header_fields::{
    Cipher, CompressionType, InnerStreamCipherAlgorithm, TransformRounds,
};
use crate::utils;
use std::convert::TryFrom;
use std::io::Read;
use tracing::{debug, trace, warn};

type Result<T> = std::result::Result<T, Error>;

/// Size of the signature and version prefix preceding the header fields
pub const HEADER_PREFIX_LEN: usize = 12;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
/// Field types for unencrypted header
pub enum OuterHeaderId {
    /// Last header field
    EndOfHeader,
    /// Custom comment to describe the database
    Comment,
    /// UUID indicating the cipher for the database
    CipherId,
    /// Compression algorithm in use
    CompressionFlags,
    /// Seed to make database keys unique
    MasterSeed,
    /// Seed used for converting passwords to keys
    LegacyTransformSeed,
    /// Number of rounds of aes256 to use to generate keys
    LegacyTransformRounds,
    /// Initial value for encrypting/decrypting the stream
    EncryptionIv,
    /// Key used for decrypting inner streams
    ProtectedStreamKey,
    /// First 32 bytes of decrypted data
    StreamStartBytes,
    /// Cipher identifer for data encrypted in memory
    InnerRandomStreamId,
    /// Some header field not supported by this library
    Unknown(u8),
}

impl From<u8> for OuterHeaderId {
    fn from(id: u8) -> OuterHeaderId {
        match id {
            0 => OuterHeaderId::EndOfHeader,
            0x1 => OuterHeaderId::Comment,
            0x2 => OuterHeaderId::CipherId,
            0x3 => OuterHeaderId::CompressionFlags,
            0x4 => OuterHeaderId::MasterSeed,
            0x5 => OuterHeaderId::LegacyTransformSeed,
            0x6 => OuterHeaderId::LegacyTransformRounds,
            0x7 => OuterHeaderId::EncryptionIv,
            0x8 => OuterHeaderId::ProtectedStreamKey,
            0x9 => OuterHeaderId::StreamStartBytes,
            0xA => OuterHeaderId::InnerRandomStreamId,
            x => OuterHeaderId::Unknown(x),
        }
    }
}

impl OuterHeaderId {
    fn is_final(&self) -> bool {
        *self == OuterHeaderId::EndOfHeader
    }
}

/// A single type-length-value record from the header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderField<T> {
    /// Field type
    pub ty: T,
    /// Raw field payload
    pub data: Vec<u8>,
}

impl<T> HeaderField<T> {
    pub(crate) fn new(ty: T, data: Vec<u8>) -> HeaderField<T> {
        HeaderField { ty, data }
    }

    /// Little endian u32 starting at `offset`, if the payload is long enough
    pub(crate) fn le_u32_at(&self, offset: usize) -> Option<u32> {
        utils::le_u32(&self.data, offset)
    }
}

/// Reads KDBX 3 header records: 1 byte id, 2 byte little endian length, payload
pub(crate) struct HeaderParser<'a, R: Read + 'a> {
    reader: &'a mut R,
    position: usize,
}

impl<'a, R> HeaderParser<'a, R>
where
    R: Read + 'a,
{
    /// `position` is the absolute offset of the reader within the file
    pub(crate) fn new(reader: &'a mut R, position: usize) -> HeaderParser<'a, R> {
        HeaderParser { reader, position }
    }

    pub(crate) fn read_one_header(&mut self) -> Result<HeaderField<OuterHeaderId>> {
        let mut ty_buffer = [0u8];
        self.reader.read_exact(&mut ty_buffer)?;
        let ty = OuterHeaderId::from(ty_buffer[0]);
        let mut len_buffer = [0u8; 2];
        self.reader.read_exact(&mut len_buffer)?;
        let len = u16::from_le_bytes(len_buffer);
        let mut header_buffer = utils::buffer(len as usize);
        self.reader.read_exact(&mut header_buffer)?;
        self.position += 3 + len as usize;
        trace!(field = ?ty, len, "read header field");

        Ok(HeaderField::new(ty, header_buffer))
    }

    /// Read every record up to and including the terminator
    ///
    /// Returns the non terminal records and the offset just past the terminator
    pub(crate) fn read_all_headers(mut self) -> Result<(Vec<HeaderField<OuterHeaderId>>, usize)> {
        let mut headers = Vec::new();
        let mut header = self.read_one_header()?;
        while !header.ty.is_final() {
            headers.push(header);
            header = self.read_one_header()?;
        }

        Ok((headers, self.position))
    }
}

#[derive(Default)]
struct KdbxHeaderBuilder {
    cipher: Option<Cipher>,
    compression_type: Option<CompressionType>,
    master_seed: Option<Vec<u8>>,
    transform_seed: Option<Vec<u8>>,
    transform_rounds: Option<TransformRounds>,
    encryption_iv: Option<Vec<u8>>,
    protected_stream_key: Option<Vec<u8>>,
    stream_start_bytes: Option<Vec<u8>>,
    inner_stream_cipher: Option<InnerStreamCipherAlgorithm>,
    other_headers: Vec<HeaderField<OuterHeaderId>>,
}

impl KdbxHeaderBuilder {
    fn add_header(&mut self, header: HeaderField<OuterHeaderId>) -> Result<()> {
        match header.ty {
            OuterHeaderId::CipherId => self.cipher = Some(Cipher::try_from(&header)?),
            OuterHeaderId::CompressionFlags => {
                let flags = header.le_u32_at(0).ok_or_else(|| {
                    Error::MalformedField(header.ty, "Wrong size for compression ID".into())
                })?;
                self.compression_type = Some(CompressionType::from(flags));
            }
            OuterHeaderId::MasterSeed => self.master_seed = Some(header.data),
            OuterHeaderId::LegacyTransformSeed => self.transform_seed = Some(header.data),
            OuterHeaderId::LegacyTransformRounds => {
                self.transform_rounds = Some(TransformRounds::try_from(&header)?)
            }
            OuterHeaderId::EncryptionIv => self.encryption_iv = Some(header.data),
            OuterHeaderId::ProtectedStreamKey => self.protected_stream_key = Some(header.data),
            OuterHeaderId::StreamStartBytes => self.stream_start_bytes = Some(header.data),
            OuterHeaderId::InnerRandomStreamId => {
                let id = header.le_u32_at(0).ok_or_else(|| {
                    Error::MalformedField(header.ty, "Wrong size for inner stream ID".into())
                })?;
                self.inner_stream_cipher = Some(InnerStreamCipherAlgorithm::from(id));
            }
            OuterHeaderId::Unknown(id) => {
                warn!(id, "skipping unknown header field");
                self.other_headers.push(header)
            }
            _ => {
                debug!(field = ?header.ty, "keeping header field aside");
                self.other_headers.push(header)
            }
        }

        Ok(())
    }

    fn build(self, version: u32, data_start: usize) -> KdbxHeader {
        KdbxHeader {
            version,
            cipher: self.cipher,
            compression_type: self.compression_type.unwrap_or_default(),
            master_seed: self.master_seed,
            transform_seed: self.transform_seed,
            transform_rounds: self.transform_rounds,
            encryption_iv: self.encryption_iv,
            protected_stream_key: self.protected_stream_key,
            stream_start_bytes: self.stream_start_bytes,
            inner_stream_cipher: self.inner_stream_cipher,
            other_headers: self.other_headers,
            data_start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Unencrypted database configuration read from a KDBX 3 file
///
/// Every field other than the version and data offset is optional in
/// the file. Fields required for unlocking are checked when the
/// database is unlocked, not when it is read.
pub struct KdbxHeader {
    /// Raw file version, major version in the high 16 bits
    pub version: u32,
    /// Encryption cipher used for decryption the database
    pub cipher: Option<Cipher>,
    /// Compression applied prior to encryption, `None` when absent
    pub compression_type: CompressionType,
    /// Master seed used to make crypto keys DB specific
    pub master_seed: Option<Vec<u8>>,
    /// AES key used for the key transformation rounds
    pub transform_seed: Option<Vec<u8>>,
    /// Number of key transformation rounds
    pub transform_rounds: Option<TransformRounds>,
    /// IV used for initializing crypto
    pub encryption_iv: Option<Vec<u8>>,
    /// Key material for the inner random stream
    pub protected_stream_key: Option<Vec<u8>>,
    /// Expected first 32 bytes of the decrypted payload
    pub stream_start_bytes: Option<Vec<u8>>,
    /// Stream cipher protecting in-memory values
    pub inner_stream_cipher: Option<InnerStreamCipherAlgorithm>,
    /// Custom and unrecognized header types
    pub other_headers: Vec<HeaderField<OuterHeaderId>>,
    /// Byte offset at which the encrypted payload begins
    pub data_start: usize,
}

impl KdbxHeader {
    /// Major file format version
    pub fn major_version(&self) -> u16 {
        (self.version >> 16) as u16
    }

    /// Minor file format version
    pub fn minor_version(&self) -> u16 {
        (self.version & 0xFFFF) as u16
    }

    /// Parse the header fields following the signature and version
    ///
    /// `reader` must be positioned at [`HEADER_PREFIX_LEN`]
    pub(crate) fn read<R: Read>(reader: &mut R, version: u32) -> Result<KdbxHeader> {
        let mut header_builder = KdbxHeaderBuilder::default();
        let (headers, data_start) = HeaderParser::new(reader, HEADER_PREFIX_LEN).read_all_headers()?;
        for header in headers {
            header_builder.add_header(header)?;
        }

        Ok(header_builder.build(version, data_start))
    }
}
