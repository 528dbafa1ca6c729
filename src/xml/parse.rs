use super::decoders;
use crate::types::{Entry, ProtectedValue};
use std::io::Read;
use thiserror::Error;
use tracing::{debug, instrument};
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

const RECYCLE_BIN: &str = "Recycle Bin";

#[derive(Debug, Error)]
/// Error encountered parsing XML
pub enum Error {
    /// Error from the underlying XML parser
    #[error("Error parsing database XML: {0}")]
    Xml(String),
    /// A protected value is not base64 encoded
    #[error("Protected value for field {key} is not valid base64")]
    InvalidProtectedValue {
        /// Name of the field holding the value
        key: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<xml::reader::Error> for Error {
    fn from(e: xml::reader::Error) -> Error {
        Error::Xml(e.msg().to_string())
    }
}

enum RawValue {
    Plain(String),
    Protected(Vec<u8>),
}

struct RawField {
    key: String,
    value: RawValue,
}

/// An entry as read from the document, before stream offsets are assigned
struct EntryRecord {
    fields: Vec<RawField>,
    group_name: Option<String>,
    included: bool,
}

#[derive(Default)]
struct PendingField {
    key: Option<String>,
    value: Option<String>,
    protected: bool,
    key_claimed: bool,
    value_claimed: bool,
}

enum Role {
    Other,
    /// `Entry` element, index of its record
    Entry(usize),
    /// `String` element directly inside an entry
    Field(usize, PendingField),
    /// `Name` element, names its parent group
    Name,
    /// First `Key` inside a field, stack index of the field
    FieldKey(usize),
    /// First `Value` inside a field, stack index of the field
    FieldValue(usize),
}

struct Frame {
    local_name: String,
    role: Role,
    text: Option<String>,
    group_name: Option<String>,
    child_entries: Vec<usize>,
}

#[derive(Default)]
struct EntryExtractor {
    frames: Vec<Frame>,
    records: Vec<EntryRecord>,
}

impl EntryExtractor {
    fn enclosing_field(&mut self) -> Option<(usize, &mut PendingField)> {
        self.frames
            .iter_mut()
            .enumerate()
            .rev()
            .find_map(|(idx, frame)| match &mut frame.role {
                Role::Field(_, pending) => Some((idx, pending)),
                _ => None,
            })
    }

    fn start_element(&mut self, local_name: String, attributes: &[OwnedAttribute]) {
        let parent = self.frames.last_mut();
        let role = match local_name.as_str() {
            "Entry" => {
                let in_history = parent
                    .as_ref()
                    .map_or(false, |frame| frame.local_name == "History");
                let record = self.records.len();
                self.records.push(EntryRecord {
                    fields: Vec::new(),
                    group_name: None,
                    included: !in_history,
                });
                if let (false, Some(parent)) = (in_history, parent) {
                    parent.child_entries.push(record);
                }
                Role::Entry(record)
            }
            "String" => match parent.as_deref().map(|frame| &frame.role) {
                Some(Role::Entry(record)) => Role::Field(*record, PendingField::default()),
                _ => Role::Other,
            },
            "Name" => Role::Name,
            "Key" => match self.enclosing_field() {
                Some((idx, pending)) if !pending.key_claimed => {
                    pending.key_claimed = true;
                    Role::FieldKey(idx)
                }
                _ => Role::Other,
            },
            "Value" => match self.enclosing_field() {
                Some((idx, pending)) if !pending.value_claimed => {
                    pending.value_claimed = true;
                    pending.protected = attributes
                        .iter()
                        .any(|attr| attr.name.local_name == "Protected");
                    Role::FieldValue(idx)
                }
                _ => Role::Other,
            },
            _ => Role::Other,
        };

        let text = match role {
            Role::Name | Role::FieldKey(_) | Role::FieldValue(_) => Some(String::new()),
            _ => None,
        };
        self.frames.push(Frame {
            local_name,
            role,
            text,
            group_name: None,
            child_entries: Vec::new(),
        });
    }

    fn characters(&mut self, chars: &str) {
        for text in self.frames.iter_mut().filter_map(|frame| frame.text.as_mut()) {
            text.push_str(chars);
        }
    }

    fn end_element(&mut self) -> Result<()> {
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Ok(()),
        };
        let text = frame.text.unwrap_or_default();

        match frame.role {
            Role::Name => {
                if let Some(parent) = self.frames.last_mut() {
                    parent.group_name = Some(text);
                }
            }
            Role::FieldKey(idx) => {
                if let Some(Role::Field(_, pending)) = self.frames.get_mut(idx).map(|f| &mut f.role) {
                    pending.key = Some(text);
                }
            }
            Role::FieldValue(idx) => {
                if let Some(Role::Field(_, pending)) = self.frames.get_mut(idx).map(|f| &mut f.role) {
                    pending.value = Some(text);
                }
            }
            Role::Field(record, pending) => {
                let key = pending.key.unwrap_or_default();
                let value = pending.value.unwrap_or_default();
                let value = if pending.protected {
                    let data = decoders::decode_base64(&value)
                        .ok_or_else(|| Error::InvalidProtectedValue { key: key.clone() })?;
                    RawValue::Protected(data)
                } else {
                    RawValue::Plain(value)
                };
                self.records[record].fields.push(RawField { key, value });
            }
            Role::Entry(_) | Role::Other => {}
        }

        for record in frame.child_entries {
            let record = &mut self.records[record];
            if frame.group_name.as_deref() == Some(RECYCLE_BIN) {
                record.included = false;
            }
            record.group_name = frame.group_name.clone();
        }

        Ok(())
    }

    /// Assign inner stream offsets and drop excluded entries
    ///
    /// Offsets run across every entry in the order entries open, each
    /// entry's protected fields in order, so excluded entries still
    /// consume their share of the stream.
    fn finish(self) -> Vec<Entry> {
        let mut position = 0u64;
        let mut protected_count = 0usize;
        let mut entries = Vec::new();

        for record in self.records {
            let mut entry = Entry::default();
            entry.set_group_name(record.group_name);
            for field in record.fields {
                match field.value {
                    RawValue::Plain(text) => entry.set_field(field.key, text),
                    RawValue::Protected(data) => {
                        let len = data.len() as u64;
                        entry.set_protected_field(field.key, ProtectedValue::new(position, data));
                        position += len;
                        protected_count += 1;
                    }
                }
            }
            if record.included {
                entries.push(entry);
            }
        }

        debug!(
            entries = entries.len(),
            protected_count,
            stream_len = position,
            "extracted entries"
        );
        entries
    }
}

/// Extract password entries from decrypted database XML
///
/// Entries inside `History` elements and entries of the group named
/// `Recycle Bin` are left out of the result. Protected values keep their
/// ciphertext along with their offset in the inner random stream.
#[instrument(skip_all)]
pub fn parse_xml<R: Read>(xml_data: R) -> Result<Vec<Entry>> {
    let xml_config = xml::ParserConfig::new().cdata_to_characters(true);
    let xml_event_reader = EventReader::new_with_config(xml_data, xml_config);
    let mut extractor = EntryExtractor::default();

    for evt in xml_event_reader {
        match evt? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => extractor.start_element(name.local_name, &attributes),
            XmlEvent::EndElement { .. } => extractor.end_element()?,
            XmlEvent::Characters(chars) | XmlEvent::CData(chars) | XmlEvent::Whitespace(chars) => {
                extractor.characters(&chars)
            }
            _ => {}
        }
    }

    Ok(extractor.finish())
}
