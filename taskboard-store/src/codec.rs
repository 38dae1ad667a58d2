//! Record encoding
//!
//! Records are stored as JSON objects: self-describing (field names are
//! carried), with timestamps in RFC 3339 at full precision. Decoding
//! ignores unknown fields and defaults missing ones, so only structurally
//! malformed input fails.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Encoding errors
#[derive(Error, Debug)]
pub enum CodecError {
    /// Record could not be encoded
    #[error("Failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored bytes do not parse as the expected record
    #[error("Failed to decode record: {0}")]
    Decode(#[source] serde_json::Error),

    /// Raw identifier value is not valid UTF-8
    #[error("Failed to decode identifier: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encodes a record to bytes for storage
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(record).map_err(CodecError::Encode)
}

/// Decodes a record from stored bytes
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

/// Decodes a raw identifier value (index entries hold ids, not JSON)
pub fn decode_id(bytes: Vec<u8>) -> Result<String, CodecError> {
    Ok(String::from_utf8(bytes)?)
}
