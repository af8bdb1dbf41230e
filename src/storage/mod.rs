//! In-memory reference store: one table of rows, each row an integer id
//! plus named cells. A document column is just a text cell holding the
//! serialized document.

use crate::core::{DbError, Result, Value};
use crate::document;
use log::debug;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Cell values for a row about to be inserted. Built with the builder
/// methods, then handed to [`Table::insert`].
#[derive(Debug, Clone, Default)]
pub struct RowValues {
    columns: BTreeMap<String, Value>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar cell.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.insert(column.to_string(), value.into());
        self
    }

    /// Serialize a document into a text cell. Unserializable values fail
    /// here, at the validation layer, before anything reaches the table.
    pub fn set_document<T: Serialize>(mut self, column: &str, doc: &T) -> Result<Self> {
        document::validate_document(doc)?;
        let text = document::to_stored_text(doc)?;
        self.columns.insert(column.to_string(), Value::Text(text));
        Ok(self)
    }
}

/// A stored row: assigned id plus cells.
#[derive(Debug, Clone)]
pub struct StoredRow {
    id: i64,
    columns: BTreeMap<String, Value>,
}

impl StoredRow {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Deserialize the document held in a text cell. A missing or NULL cell
    /// reads as a null document; malformed stored text is fatal.
    pub fn document(&self, column: &str) -> Result<JsonValue> {
        match self.columns.get(column) {
            None | Some(Value::Null) => Ok(JsonValue::Null),
            Some(Value::Text(text)) => document::from_stored_text(text),
            Some(other) => Err(DbError::TypeMismatch(format!(
                "Column '{}' holds {}, not a stored document",
                column,
                other.type_name()
            ))),
        }
    }
}

/// An append-only in-memory table. Ids are assigned sequentially from 1.
#[derive(Debug)]
pub struct Table {
    name: String,
    rows: Vec<StoredRow>,
    next_id: i64,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: Vec::new(),
            next_id: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, values: RowValues) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push(StoredRow {
            id,
            columns: values.columns,
        });
        debug!("inserted row {} into '{}'", id, self.name);
        id
    }

    pub fn rows(&self) -> &[StoredRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut table = Table::new("people");
        let a = table.insert(RowValues::new().set("name", "alice"));
        let b = table.insert(RowValues::new().set("name", "bob"));
        assert_eq!((a, b), (1, 2));
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_document_round_trip_through_cell() {
        let mut table = Table::new("people");
        let doc = json!({"address": {"line_1": "Some Terrace"}});
        table.insert(RowValues::new().set_document("json_data", &doc).unwrap());

        let row = &table.rows()[0];
        assert_eq!(row.document("json_data").unwrap(), doc);
    }

    #[test]
    fn test_missing_document_reads_as_null() {
        let mut table = Table::new("people");
        table.insert(RowValues::new().set("name", "alice"));
        let row = &table.rows()[0];
        assert_eq!(row.document("json_data").unwrap(), JsonValue::Null);
    }

    #[test]
    fn test_malformed_stored_text_is_fatal() {
        let mut table = Table::new("people");
        table.insert(RowValues::new().set("json_data", "{broken"));
        let err = table.rows()[0].document("json_data").unwrap_err();
        assert!(matches!(err, DbError::MalformedDocument(_)));
    }
}
