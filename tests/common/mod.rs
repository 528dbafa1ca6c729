//! Builds KDBX 3 files in memory from known inputs
#![allow(dead_code)]

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cipher::block_padding::Pkcs7;
use cipher::{BlockEncryptMut, KeyIvInit, StreamCipher};
use rand::RngCore;
use salsa20::Salsa20;
use sha2::{Digest, Sha256};
use std::io::Write;

pub const PASSWORD: &str = "kdbxrs";
pub const AES256_UUID: [u8; 16] = [
    0x31, 0xc1, 0xf2, 0xe6, 0xbf, 0x71, 0x43, 0x50, 0xbe, 0x58, 0x05, 0x21, 0x6a, 0xfc, 0x5a, 0xff,
];
pub const TWOFISH_UUID: [u8; 16] = [
    0xad, 0x68, 0xf2, 0x9f, 0x57, 0x6f, 0x4b, 0xb9, 0xa3, 0x6a, 0xd4, 0x7a, 0xf9, 0x65, 0x34, 0x6c,
];
const SALSA20_IV: [u8; 8] = [0xe8, 0x30, 0x09, 0x4b, 0x97, 0x20, 0x5d, 0x2a];

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// A string field of a fixture entry
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub key: String,
    pub value: String,
    pub protected: bool,
}

impl FieldSpec {
    pub fn plain(key: &str, value: &str) -> FieldSpec {
        FieldSpec {
            key: key.into(),
            value: value.into(),
            protected: false,
        }
    }

    pub fn protected(key: &str, value: &str) -> FieldSpec {
        FieldSpec {
            key: key.into(),
            value: value.into(),
            protected: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EntrySpec {
    pub fields: Vec<FieldSpec>,
    pub history: Vec<EntrySpec>,
}

#[derive(Clone, Debug, Default)]
pub struct GroupSpec {
    pub name: Option<String>,
    pub entries: Vec<EntrySpec>,
    pub groups: Vec<GroupSpec>,
}

/// Writes the XML document, encrypting protected values with a single
/// Salsa20 stream in the order they are written
struct DocumentWriter {
    cipher: Salsa20,
    xml: String,
}

impl DocumentWriter {
    fn field(&mut self, field: &FieldSpec) {
        self.xml.push_str("<String><Key>");
        self.xml.push_str(&escape(&field.key));
        if field.protected {
            let mut data = field.value.as_bytes().to_vec();
            self.cipher.apply_keystream(&mut data);
            self.xml.push_str("</Key><Value Protected=\"True\">");
            self.xml.push_str(&STANDARD.encode(&data));
        } else {
            self.xml.push_str("</Key><Value>");
            self.xml.push_str(&escape(&field.value));
        }
        self.xml.push_str("</Value></String>");
    }

    fn entry(&mut self, entry: &EntrySpec) {
        self.xml.push_str("<Entry><UUID>AAAAAAAAAAAAAAAAAAAAAA==</UUID>");
        for field in &entry.fields {
            self.field(field);
        }
        if !entry.history.is_empty() {
            self.xml.push_str("<History>");
            for old in &entry.history {
                self.entry(old);
            }
            self.xml.push_str("</History>");
        }
        self.xml.push_str("</Entry>");
    }

    fn group(&mut self, group: &GroupSpec) {
        self.xml.push_str("<Group>");
        if let Some(name) = &group.name {
            self.xml.push_str("<Name>");
            self.xml.push_str(&escape(name));
            self.xml.push_str("</Name>");
        }
        for entry in &group.entries {
            self.entry(entry);
        }
        for child in &group.groups {
            self.group(child);
        }
        self.xml.push_str("</Group>");
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render a KeePass XML document with protected values encrypted under
/// `protected_stream_key`
pub fn render_document(root: &GroupSpec, protected_stream_key: &[u8]) -> String {
    let key = sha256(protected_stream_key);
    let mut writer = DocumentWriter {
        cipher: Salsa20::new(&key.into(), &SALSA20_IV.into()),
        xml: String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n\
             <KeePassFile><Meta><Generator>kdbx3-rs tests</Generator>\
             <DatabaseName>Fixture</DatabaseName></Meta><Root>",
        ),
    };
    writer.group(root);
    writer.xml.push_str("<DeletedObjects/></Root></KeePassFile>");
    writer.xml
}

/// The reference database used by most tests
///
/// Protected values in stream order:
/// "correct horse" (0), "old pass" (13), "battery staple" (21),
/// "pin 1234" (35), "gone" (43), "ünïcødé" (47)
pub fn sample_group() -> GroupSpec {
    GroupSpec {
        name: Some("Root".into()),
        entries: vec![
            EntrySpec {
                fields: vec![
                    FieldSpec::plain("Title", "Bank"),
                    FieldSpec::plain("UserName", "alice"),
                    FieldSpec::plain("URL", "https://bank.example"),
                    FieldSpec::protected("Password", "correct horse"),
                ],
                history: vec![EntrySpec {
                    fields: vec![
                        FieldSpec::plain("Title", "Bank"),
                        FieldSpec::protected("Password", "old pass"),
                    ],
                    history: Vec::new(),
                }],
            },
        ],
        groups: vec![
            GroupSpec {
                name: Some("Email".into()),
                entries: vec![EntrySpec {
                    fields: vec![
                        FieldSpec::plain("Title", "Mail"),
                        FieldSpec::plain("UserName", "bob"),
                        FieldSpec::protected("Password", "battery staple"),
                        FieldSpec::protected("Notes", "pin 1234"),
                    ],
                    history: Vec::new(),
                }],
                groups: Vec::new(),
            },
            GroupSpec {
                name: Some("Recycle Bin".into()),
                entries: vec![EntrySpec {
                    fields: vec![
                        FieldSpec::plain("Title", "Deleted"),
                        FieldSpec::protected("Password", "gone"),
                    ],
                    history: Vec::new(),
                }],
                groups: Vec::new(),
            },
            GroupSpec {
                name: Some("Misc".into()),
                entries: vec![EntrySpec {
                    fields: vec![
                        FieldSpec::plain("Title", "Last"),
                        FieldSpec::plain("Notes", "  spaced <text> & more  "),
                        FieldSpec::protected("Password", "ünïcødé"),
                    ],
                    history: Vec::new(),
                }],
                groups: Vec::new(),
            },
        ],
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseBuilder {
    pub password: String,
    pub key_file_key: Option<[u8; 32]>,
    pub version: u32,
    pub cipher: Option<[u8; 16]>,
    pub compression: Option<u32>,
    pub master_seed: Option<[u8; 32]>,
    pub transform_seed: Option<[u8; 32]>,
    pub rounds: Option<(u32, u32)>,
    pub iv: Option<[u8; 16]>,
    pub protected_stream_key: Option<[u8; 32]>,
    pub stream_start_bytes: Option<[u8; 32]>,
    pub inner_stream_id: Option<u32>,
    pub extra_fields: Vec<(u8, Vec<u8>)>,
    pub corrupt_block_hash: bool,
    pub root: GroupSpec,
    pub document: Option<String>,
    pub raw_document: Option<Vec<u8>>,
}

impl Default for DatabaseBuilder {
    fn default() -> DatabaseBuilder {
        DatabaseBuilder {
            password: PASSWORD.into(),
            key_file_key: None,
            version: 0x0003_0001,
            cipher: Some(AES256_UUID),
            compression: Some(1),
            master_seed: Some([0x4d; 32]),
            transform_seed: Some([0x54; 32]),
            rounds: Some((100, 0)),
            iv: Some([0x49; 16]),
            protected_stream_key: Some([0x50; 32]),
            stream_start_bytes: Some([0x53; 32]),
            inner_stream_id: Some(2),
            extra_fields: Vec::new(),
            corrupt_block_hash: false,
            root: sample_group(),
            document: None,
            raw_document: None,
        }
    }
}

fn tlv(out: &mut Vec<u8>, id: u8, data: &[u8]) {
    out.push(id);
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
}

impl DatabaseBuilder {
    pub fn new() -> DatabaseBuilder {
        DatabaseBuilder::default()
    }

    pub fn with_random_seeds(mut self) -> DatabaseBuilder {
        let mut rng = rand::thread_rng();
        let mut fill = |buf: &mut [u8]| rng.fill_bytes(buf);
        let mut master_seed = [0u8; 32];
        let mut transform_seed = [0u8; 32];
        let mut iv = [0u8; 16];
        let mut stream_key = [0u8; 32];
        let mut start = [0u8; 32];
        fill(&mut master_seed);
        fill(&mut transform_seed);
        fill(&mut iv);
        fill(&mut stream_key);
        fill(&mut start);
        self.master_seed = Some(master_seed);
        self.transform_seed = Some(transform_seed);
        self.iv = Some(iv);
        self.protected_stream_key = Some(stream_key);
        self.stream_start_bytes = Some(start);
        self
    }

    /// The XML document stored in the database
    pub fn xml(&self) -> String {
        match &self.document {
            Some(document) => document.clone(),
            None => render_document(
                &self.root,
                &self.protected_stream_key.unwrap_or_default(),
            ),
        }
    }

    pub fn cipher_key(&self) -> [u8; 32] {
        let mut parts = Vec::new();
        if !self.password.is_empty() || self.key_file_key.is_none() {
            parts.extend_from_slice(&sha256(self.password.as_bytes()));
        }
        if let Some(key) = self.key_file_key {
            parts.extend_from_slice(&key);
        }
        let composite = sha256(&parts);

        let transform_seed = self.transform_seed.unwrap_or_default();
        let cipher = Aes256::new(GenericArray::from_slice(&transform_seed));
        let mut transformed = composite;
        let (rounds, _) = self.rounds.unwrap_or_default();
        for half in transformed.chunks_mut(16) {
            let block = GenericArray::from_mut_slice(half);
            for _ in 0..rounds {
                cipher.encrypt_block(block);
            }
        }

        let mut final_input = self.master_seed.unwrap_or_default().to_vec();
        final_input.extend_from_slice(&sha256(&transformed));
        sha256(&final_input)
    }

    fn header(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0x9AA2_D903u32.to_le_bytes());
        out.extend_from_slice(&0xB54B_FB67u32.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        tlv(&mut out, 1, b"created by the test fixture");
        if let Some(cipher) = self.cipher {
            tlv(&mut out, 2, &cipher);
        }
        if let Some(compression) = self.compression {
            tlv(&mut out, 3, &compression.to_le_bytes());
        }
        if let Some(seed) = self.master_seed {
            tlv(&mut out, 4, &seed);
        }
        if let Some(seed) = self.transform_seed {
            tlv(&mut out, 5, &seed);
        }
        if let Some((low, high)) = self.rounds {
            let mut rounds = low.to_le_bytes().to_vec();
            rounds.extend_from_slice(&high.to_le_bytes());
            tlv(&mut out, 6, &rounds);
        }
        if let Some(iv) = self.iv {
            tlv(&mut out, 7, &iv);
        }
        if let Some(key) = self.protected_stream_key {
            tlv(&mut out, 8, &key);
        }
        if let Some(start) = self.stream_start_bytes {
            tlv(&mut out, 9, &start);
        }
        if let Some(id) = self.inner_stream_id {
            tlv(&mut out, 10, &id.to_le_bytes());
        }
        for (id, data) in &self.extra_fields {
            tlv(&mut out, *id, data);
        }
        tlv(&mut out, 0, &[0x0d, 0x0a, 0x0d, 0x0a]);
        out
    }

    /// Decrypted payload: start bytes, first hashed block, end block
    pub fn plaintext(&self) -> Vec<u8> {
        let xml = match &self.raw_document {
            Some(raw) => raw.clone(),
            None => self.xml().into_bytes(),
        };
        let data = if self.compression == Some(1) {
            let mut encoder = libflate::gzip::Encoder::new(Vec::new()).unwrap();
            encoder.write_all(&xml).unwrap();
            encoder.finish().into_result().unwrap()
        } else {
            xml
        };

        let mut out = self.stream_start_bytes.unwrap_or_default().to_vec();
        out.extend_from_slice(&0u32.to_le_bytes());
        let mut hash = sha256(&data);
        if self.corrupt_block_hash {
            hash[0] ^= 0xff;
        }
        out.extend_from_slice(&hash);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&data);
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 32]);
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }

    /// Length of the start bytes and the first block within the payload
    pub fn first_block_end(&self) -> usize {
        let plaintext = self.plaintext();
        plaintext.len() - 40
    }

    pub fn header_len(&self) -> usize {
        self.header().len()
    }

    pub fn build(&self) -> Vec<u8> {
        let plaintext = self.plaintext();
        let mut buffer = plaintext.clone();
        buffer.resize(plaintext.len() + 16, 0);
        let ciphertext_len = cbc::Encryptor::<Aes256>::new_from_slices(
            &self.cipher_key(),
            &self.iv.unwrap_or_default(),
        )
        .unwrap()
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, plaintext.len())
        .unwrap()
        .len();
        buffer.truncate(ciphertext_len);

        let mut out = self.header();
        out.extend_from_slice(&buffer);
        out
    }

    /// Header followed by a body that was never encrypted, for checks that
    /// must fail before any key is derived
    pub fn build_without_key(&self) -> Vec<u8> {
        let mut out = self.header();
        out.extend_from_slice(&[0u8; 64]);
        out
    }
}

/// Bytes of the reference database
pub fn sample_database() -> Vec<u8> {
    DatabaseBuilder::new().build()
}
