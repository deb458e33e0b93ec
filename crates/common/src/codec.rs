//! JSON encoding of LFS messages.
//!
//! Output is pretty-printed with lower-case field names; parsing reports
//! every structural problem or unknown tag as a [`ParseError`].

use crate::error::ParseError;
use crate::{BatchObjectAction, BatchRequest, BatchTransfer, ErrorResponse, ObjectId};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Media type of every LFS JSON request and response
pub const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";

/// Messages that travel as LFS JSON
pub trait LfsMessage: Serialize + DeserializeOwned {}

impl LfsMessage for BatchRequest {}
impl LfsMessage for BatchTransfer {}
impl LfsMessage for BatchObjectAction {}
impl LfsMessage for ErrorResponse {}
impl LfsMessage for ObjectId {}

/// Encode a message as indented JSON
pub fn serialize<T: LfsMessage>(message: &T) -> Result<String, ParseError> {
    Ok(serde_json::to_string_pretty(message)?)
}

/// Decode a message from JSON text
pub fn parse<T: LfsMessage>(input: &str) -> Result<T, ParseError> {
    Ok(serde_json::from_str(input)?)
}

/// Decode a message from a raw request or response body
pub fn parse_slice<T: LfsMessage>(input: &[u8]) -> Result<T, ParseError> {
    Ok(serde_json::from_slice(input)?)
}
