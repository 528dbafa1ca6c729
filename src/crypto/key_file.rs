use super::{sha256, KEY_SIZE};
use crate::xml::decoders;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use xml::reader::{EventReader, XmlEvent};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const DATA_PATH: [&str; 3] = ["KeyFile", "Key", "Data"];

#[derive(Debug, Error)]
/// Errors reading a key file
pub enum KeyFileError {
    /// The key file has no content
    #[error("Key file is empty")]
    EmptyKeyFile,
}

/// 32 byte contribution of a key file to the composite key
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyFileKey([u8; KEY_SIZE]);

impl KeyFileKey {
    /// Use raw bytes as a key file key
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> KeyFileKey {
        KeyFileKey(bytes)
    }

    fn from_slice(bytes: &[u8]) -> Option<KeyFileKey> {
        if bytes.len() != KEY_SIZE {
            return None;
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Some(KeyFileKey(key))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for KeyFileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyFileKey").field(&"[REDACTED]").finish()
    }
}

/// Classify key file contents into a 32 byte key
///
/// Tried in order: a raw 32 byte key, a 64 character hex key, an XML key
/// file with a `KeyFile/Key/Data` element, then SHA-256 of the whole file.
pub fn key_from_file_bytes(bytes: &[u8]) -> Result<KeyFileKey, KeyFileError> {
    if bytes.is_empty() {
        return Err(KeyFileError::EmptyKeyFile);
    }
    if let Some(key) = KeyFileKey::from_slice(bytes) {
        debug!("using raw key file");
        return Ok(key);
    }
    if bytes.len() == KEY_SIZE * 2 {
        if let Some(key) = hex_key(bytes) {
            debug!("using hex key file");
            return Ok(key);
        }
    }
    if let Some(key) = xml_key(bytes) {
        debug!("using xml key file");
        return Ok(key);
    }

    debug!("hashing opaque key file");
    Ok(KeyFileKey(sha256(bytes)))
}

fn hex_key(bytes: &[u8]) -> Option<KeyFileKey> {
    let text = std::str::from_utf8(bytes).ok()?;
    let decoded = Zeroizing::new(hex::decode(text).ok()?);
    KeyFileKey::from_slice(&decoded)
}

fn xml_key(bytes: &[u8]) -> Option<KeyFileKey> {
    let data = Zeroizing::new(key_data_text(bytes)?);
    if let Some(decoded) = decoders::decode_base64(&data) {
        let decoded = Zeroizing::new(decoded);
        if let Some(key) = KeyFileKey::from_slice(&decoded) {
            return Some(key);
        }
    }

    // KeyFile 2.0 stores the key as whitespace grouped hex
    let compact: Zeroizing<String> =
        Zeroizing::new(data.chars().filter(|c| !c.is_whitespace()).collect());
    let decoded = Zeroizing::new(hex::decode(compact.as_str()).ok()?);
    KeyFileKey::from_slice(&decoded)
}

fn at_data_path(path: &[String]) -> bool {
    path.len() >= DATA_PATH.len()
        && path[path.len() - DATA_PATH.len()..]
            .iter()
            .zip(DATA_PATH)
            .all(|(element, expected)| element == expected)
}

/// Text of the first `KeyFile/Key/Data` element, if the bytes are XML
fn key_data_text(bytes: &[u8]) -> Option<String> {
    let mut path: Vec<String> = Vec::new();
    let mut data_depth = None;
    let mut text = String::new();

    for event in EventReader::new(bytes) {
        match event.ok()? {
            XmlEvent::StartElement { name, .. } => {
                path.push(name.local_name);
                if data_depth.is_none() && at_data_path(&path) {
                    data_depth = Some(path.len());
                }
            }
            XmlEvent::Characters(chars) | XmlEvent::CData(chars) | XmlEvent::Whitespace(chars) => {
                if data_depth.is_some() {
                    text.push_str(&chars);
                }
            }
            XmlEvent::EndElement { .. } => {
                if data_depth == Some(path.len()) {
                    return Some(text);
                }
                path.pop();
            }
            XmlEvent::EndDocument => break,
            _ => {}
        }
    }
    None
}
