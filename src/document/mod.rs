//! Document serialization boundary.
//!
//! A document is any JSON-serializable value kept as text in one column of a
//! row. Every non-null stored value round-trips through
//! serialize -> deserialize without semantic change, with one documented
//! exception: datetime-like leaves serialize to their ISO-8601 string form
//! and are read back as strings, never reconstituted as date types.

use crate::core::{DbError, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Canonical serialized form of a boolean `true` leaf.
///
/// Equality on a text-typed path compares stored representation, so callers
/// that want boolean-equality semantics compare against this constant rather
/// than a native boolean.
pub const SERIALIZED_TRUE: &str = "true";

/// Canonical serialized form of a boolean `false` leaf.
pub const SERIALIZED_FALSE: &str = "false";

/// Check that a value can be serialized at all. Belongs to the
/// model-validation layer: values that fail here must never reach the write
/// path.
pub fn validate_document<T: Serialize>(value: &T) -> Result<()> {
    serde_json::to_value(value)
        .map(|_| ())
        .map_err(|e| DbError::ValidationError(format!("Value must be valid JSON: {}", e)))
}

/// Serialize a document to its stored text form.
///
/// A failure here means an unvalidated value reached persistence.
pub fn to_stored_text<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| DbError::SerializeError(e.to_string()))
}

/// Parse stored text back into a document. Malformed text is fatal; there is
/// no partial-read or default-substitution recovery.
pub fn from_stored_text(text: &str) -> Result<JsonValue> {
    serde_json::from_str(text).map_err(|e| DbError::MalformedDocument(e.to_string()))
}
