use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Decode base64 text from a Keepass XML file
///
/// Whitespace inside the text is ignored, as XML values may be wrapped
pub(crate) fn decode_base64(text: &str) -> Option<Vec<u8>> {
    if text.contains(|c: char| c.is_ascii_whitespace()) {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD.decode(compact).ok()
    } else {
        STANDARD.decode(text).ok()
    }
}
