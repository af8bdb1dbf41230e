// ============================================================================
// jsonfield Library
// ============================================================================

//! Store JSON documents in a plain text column and query nested keys as if
//! they were native columns.
//!
//! The engine translates dotted-path lookups of the shape
//! `<column>__<segment>[__<segment>...][__<lookup>]` into composable SQL
//! predicate fragments with correct table aliasing, and ships an in-memory
//! reference store that executes the same semantics for testing.
//!
//! # Examples
//!
//! ```
//! use jsonfield::{Query, RowValues, Table};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> jsonfield::Result<()> {
//! let mut table = Table::new("people");
//! table.insert(
//!     RowValues::new()
//!         .set("name", "alice")
//!         .set_document("json_data", &json!({
//!             "address": {"house_number": 60, "line_1": "Some Terrace"}
//!         }))?,
//! );
//!
//! let query = Query::new(Arc::new(table))
//!     .filter_json("json_data__address__house_number__gte", 60)?;
//! assert_eq!(query.count()?, 1);
//!
//! let (sql, params) = query.to_sql()?;
//! assert!(sql.contains("TO_NUMBER"));
//! assert_eq!(params.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod document;
pub mod lookup;
pub mod path;
pub mod query;
pub mod storage;
mod expression;

// Re-export main types for convenience
pub use crate::core::{DbError, Result, Value};
pub use document::{SERIALIZED_FALSE, SERIALIZED_TRUE};
pub use lookup::{FilterValue, Lookup, Predicate, resolve_lookup};
pub use path::{AccessorType, KeyAccessor};
pub use query::Query;
pub use storage::{RowValues, StoredRow, Table};
