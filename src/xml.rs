//! Work directly with the KDBX decrypted inner XML format

pub(crate) mod decoders;
pub(crate) mod parse;

pub use crate::stream::random::InnerStreamError;
pub use parse::parse_xml;
