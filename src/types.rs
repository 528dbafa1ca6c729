//! Keepass data types

use crate::binary::KdbxHeader;
use crate::stream::{self, InnerStreamError};
use std::collections::BTreeMap;
use std::fmt;

/// A field value still encrypted with the inner random stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedValue {
    position: u64,
    data: Vec<u8>,
}

impl ProtectedValue {
    /// Create a protected value from its stream offset and ciphertext
    pub fn new(position: u64, data: Vec<u8>) -> ProtectedValue {
        ProtectedValue { position, data }
    }

    /// Byte offset of this value within the file wide inner stream
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Encrypted bytes of this value
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Decrypt this value with the header's protected stream key
    pub fn decrypt(&self, stream_key: &[u8]) -> Result<String, InnerStreamError> {
        stream::decrypt_field(self, stream_key)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// A single password entry
///
/// Plain and protected fields are kept in separate maps, a field name
/// is only ever present in one of them.
pub struct Entry {
    group_name: Option<String>,
    fields: BTreeMap<String, String>,
    protected: BTreeMap<String, ProtectedValue>,
}

impl Entry {
    /// Name of the group containing this entry, if it has one
    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    pub(crate) fn set_group_name(&mut self, name: Option<String>) {
        self.group_name = name;
    }

    /// Fields stored without memory protection
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Fields encrypted with the inner random stream
    pub fn protected_fields(&self) -> &BTreeMap<String, ProtectedValue> {
        &self.protected
    }

    /// Set an unprotected field, replacing any protected field of that name
    pub fn set_field(&mut self, key: String, value: String) {
        self.protected.remove(&key);
        self.fields.insert(key, value);
    }

    /// Set a protected field, replacing any unprotected field of that name
    pub fn set_protected_field(&mut self, key: String, value: ProtectedValue) {
        self.fields.remove(&key);
        self.protected.insert(key, value);
    }

    /// Find an unprotected field with a given key
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Find a protected field with a given key
    pub fn protected_field(&self, key: &str) -> Option<&ProtectedValue> {
        self.protected.get(key)
    }

    /// Return the title of this item
    pub fn title(&self) -> Option<&str> {
        self.field("Title")
    }

    /// Return the username of this item
    pub fn username(&self) -> Option<&str> {
        self.field("UserName")
    }

    /// Return the URL of this item
    pub fn url(&self) -> Option<&str> {
        self.field("URL")
    }

    /// Return the still encrypted password of this item
    pub fn password(&self) -> Option<&ProtectedValue> {
        self.protected_field("Password")
    }
}

/// Everything recovered from a database
pub struct Decoded {
    /// Entries outside history and the recycle bin, in document order
    pub entries: Vec<Entry>,
    /// Unencrypted header, holds the key for protected values
    pub header: KdbxHeader,
    /// Decrypted XML document
    pub document: String,
}

impl Decoded {
    /// Decrypt a protected value with this database's stream key
    pub fn decrypt_field(&self, value: &ProtectedValue) -> Result<String, InnerStreamError> {
        let stream_key = self
            .header
            .protected_stream_key
            .as_deref()
            .ok_or(InnerStreamError::MissingKey)?;
        value.decrypt(stream_key)
    }
}

impl fmt::Debug for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoded")
            .field("entries", &self.entries)
            .field("header", &self.header)
            .field("document_len", &self.document.len())
            .finish()
    }
}
