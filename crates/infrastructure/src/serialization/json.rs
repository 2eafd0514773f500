//! JSON encoding for files written by the client.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Failure to encode or decode a JSON file.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// The value could not be written as JSON.
    #[error("failed to encode JSON: {0}")]
    Encode(#[source] serde_json::Error),

    /// The bytes are not JSON of the expected shape.
    #[error("failed to decode JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encodes `value` as 2-space indented JSON ending in a newline.
///
/// Map key order is whatever the type serializes; stored types use
/// `BTreeMap` so files come out sorted.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized.
pub fn encode_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut buffer = Vec::with_capacity(256);
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(SerializationError::Encode)?;
    buffer.push(b'\n');
    Ok(buffer)
}

/// Decodes JSON bytes, pretty-printed or not.
///
/// # Errors
///
/// Returns an error if the bytes are not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    serde_json::from_slice(bytes).map_err(SerializationError::Decode)
}
