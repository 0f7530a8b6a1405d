//! Line codec for stored records
//!
//! Every record is persisted as exactly one compact JSON object:
//! - Field order follows the struct declaration (`id` first)
//! - No added whitespace
//! - `<`, `>` and `&` are written verbatim (never as `\u003c` escapes)
//!
//! Substring search runs over the encoded text, so the encoding must be
//! stable across calls for the same record.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

/// Indent unit for human-facing renderings.
pub const INDENT: &[u8] = b"  ";

/// Result type for codec operations
pub type SerializationResult<T> = Result<T, SerializationError>;

/// Codec errors
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The line is not valid JSON or does not have the expected shape
    #[error("parse error: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("encoded output is not valid UTF-8")]
    Utf8,
}

/// Encodes a value as one compact JSON line (no trailing newline).
pub fn encode<T: Serialize + ?Sized>(value: &T) -> SerializationResult<String> {
    serde_json::to_string(value).map_err(SerializationError::Encode)
}

/// Encodes a value as indented JSON for display.
///
/// Never written to a backing file.
pub fn encode_indented<T: Serialize + ?Sized>(value: &T) -> SerializationResult<String> {
    let mut buf = Vec::with_capacity(128);
    let formatter = PrettyFormatter::with_indent(INDENT);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(SerializationError::Encode)?;
    String::from_utf8(buf).map_err(|_| SerializationError::Utf8)
}

/// Decodes one line back into a value.
pub fn decode<T: DeserializeOwned>(line: &str) -> SerializationResult<T> {
    serde_json::from_str(line).map_err(SerializationError::Parse)
}
