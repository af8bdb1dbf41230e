//! Key path resolution against the stored document column.
//!
//! A [`KeyAccessor`] is an immutable value object pairing a document column
//! with an ordered chain of key segments and an expected result type. The
//! same accessor may be shared as a common subexpression across queries, so
//! nothing here mutates after construction: extending or retyping an
//! accessor always produces a new value.

use serde_json::Value as JsonValue;

/// Expected result type of a resolved path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorType {
    /// Untyped path extraction, the form a bare transform produces.
    Generic,
    /// Compare against the stored (serialized) text representation.
    Text,
    /// Coerce the stored leaf to a number before comparing.
    Numeric,
}

/// A dotted key path bound to a document column and an [`AccessorType`].
///
/// Identity for caching and dedup purposes is `(column, segments, type)`,
/// hence the derived `Eq` and `Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyAccessor {
    column: String,
    segments: Vec<String>,
    accessor_type: AccessorType,
}

impl KeyAccessor {
    /// Resolve a full path in one call.
    ///
    /// Panics if `segments` is empty: a path with no segments is a
    /// programming-contract violation, not a recoverable condition.
    pub fn from_path<S: AsRef<str>>(column: &str, segments: &[S]) -> Self {
        assert!(
            !segments.is_empty(),
            "key path must contain at least one segment"
        );
        let root = Self::root(column);
        segments
            .iter()
            .fold(root, |accessor, segment| accessor.extend(segment.as_ref()))
    }

    /// The document column itself, before any key segment is applied.
    fn root(column: &str) -> Self {
        Self {
            column: column.to_string(),
            segments: Vec::new(),
            accessor_type: AccessorType::Generic,
        }
    }

    /// Extend an already-resolved accessor by one segment.
    ///
    /// The prefix is reused as-is, never re-walked from the root. Segments
    /// that look like integers stay literal key names; the stored document
    /// is addressed purely by key.
    pub fn extend(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self {
            column: self.column.clone(),
            segments,
            accessor_type: self.accessor_type,
        }
    }

    /// Retype the same path. Returns `self` unchanged when the type already
    /// matches, so repeated rebinds stay referentially consistent.
    pub fn rebind(&self, accessor_type: AccessorType) -> Self {
        Self {
            column: self.column.clone(),
            segments: self.segments.clone(),
            accessor_type,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn accessor_type(&self) -> AccessorType {
        self.accessor_type
    }

    /// Dotted display form of the path, used in error messages.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// SQL fragment for this accessor against an aliased table reference.
    ///
    /// A single-segment path emits one native path operator against the
    /// root; a deeper path emits one combined fragment with every segment
    /// quoted as an identifier, never nested per-level operators. Numeric
    /// accessors wrap the fragment in `TO_NUMBER(...)`.
    pub fn to_sql(&self, alias: &str) -> String {
        let root = format!("{}.\"{}\"", alias, self.column);
        if self.segments.is_empty() {
            return root;
        }

        let path = if self.segments.len() == 1 {
            format!("({}.{})", root, self.segments[0])
        } else {
            let quoted: Vec<String> = self
                .segments
                .iter()
                .map(|key| format!("\"{}\"", key))
                .collect();
            format!("({}.{})", root, quoted.join("."))
        };

        match self.accessor_type {
            AccessorType::Numeric => format!("TO_NUMBER({})", path),
            AccessorType::Generic | AccessorType::Text => path,
        }
    }

    /// Walk the path inside a deserialized document. `None` when any segment
    /// is missing along the way; segments address object keys only.
    pub fn resolve_in<'a>(&self, document: &'a JsonValue) -> Option<&'a JsonValue> {
        let mut current = document;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_segment_fragment() {
        let accessor = KeyAccessor::from_path("json_data", &["name"]);
        assert_eq!(accessor.to_sql("t0"), "(t0.\"json_data\".name)");
    }

    #[test]
    fn test_multi_segment_combined_fragment() {
        let accessor = KeyAccessor::from_path("json_data", &["address", "house_number"]);
        assert_eq!(
            accessor.to_sql("t0"),
            "(t0.\"json_data\".\"address\".\"house_number\")"
        );

        // Three levels still produce one combined expression.
        let deep = accessor.extend("suffix");
        assert_eq!(
            deep.to_sql("t1"),
            "(t1.\"json_data\".\"address\".\"house_number\".\"suffix\")"
        );
    }

    #[test]
    fn test_numeric_rebind_wraps_fragment() {
        let accessor = KeyAccessor::from_path("json_data", &["age"]).rebind(AccessorType::Numeric);
        assert_eq!(accessor.to_sql("t0"), "TO_NUMBER((t0.\"json_data\".age))");
    }

    #[test]
    fn test_extend_reuses_prefix() {
        let prefix = KeyAccessor::from_path("json_data", &["address"]);
        let full = prefix.extend("line_1");
        assert_eq!(full.segments(), &["address", "line_1"]);
        assert_eq!(full, KeyAccessor::from_path("json_data", &["address", "line_1"]));
    }

    #[test]
    fn test_identity_is_path_and_type() {
        let a = KeyAccessor::from_path("json_data", &["x"]);
        let b = KeyAccessor::from_path("json_data", &["x"]);
        assert_eq!(a, b);
        assert_ne!(a, a.rebind(AccessorType::Numeric));
        assert_eq!(a.rebind(AccessorType::Text), b.rebind(AccessorType::Text));
    }

    #[test]
    fn test_numeric_looking_segment_is_a_key() {
        let accessor = KeyAccessor::from_path("json_data", &["items", "0"]);
        let doc = json!({"items": {"0": "first"}});
        assert_eq!(accessor.resolve_in(&doc), Some(&json!("first")));

        // An actual array is never indexed.
        let array_doc = json!({"items": ["first"]});
        assert_eq!(accessor.resolve_in(&array_doc), None);
    }

    #[test]
    fn test_resolve_in_missing_key() {
        let accessor = KeyAccessor::from_path("json_data", &["a", "b"]);
        assert_eq!(accessor.resolve_in(&json!({"a": {}})), None);
        assert_eq!(accessor.resolve_in(&json!({})), None);
        assert_eq!(accessor.resolve_in(&json!(null)), None);
    }

    #[test]
    #[should_panic(expected = "at least one segment")]
    fn test_empty_path_fails_fast() {
        let _ = KeyAccessor::from_path::<&str>("json_data", &[]);
    }
}
