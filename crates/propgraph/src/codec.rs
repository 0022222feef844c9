//! Property codec: typed values to and from the JSON text of the
//! `properties` column.
//!
//! One physical table hosts every node (or edge) kind; the codec is what gives
//! each call site a statically typed view of its own kind's payload.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ErrorKind;

/// Capability bound for property payloads: anything serde can round-trip
/// through JSON.
pub trait Properties: Serialize + DeserializeOwned {}

impl<T: Serialize + DeserializeOwned> Properties for T {}

/// Encodes `value` as JSON text.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, ErrorKind> {
    serde_json::to_string(value).map_err(ErrorKind::Serialization)
}

/// Decodes stored JSON text. A NULL column decodes as JSON `null`.
pub fn decode<T: DeserializeOwned>(text: Option<&str>) -> Result<T, ErrorKind> {
    serde_json::from_str(text.unwrap_or("null")).map_err(ErrorKind::Deserialization)
}
