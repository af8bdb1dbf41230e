//! Query combination over the stored row population.
//!
//! Applying two document predicates directly as one AND step can force both
//! to hold against the same table reference, which is not the intended
//! "independently narrow the full population" semantics. Every
//! [`Query::filter_json`] call therefore goes through the combinator: the
//! call's predicates are applied to an internal copy of the base query,
//! that copy is projected down to its id column, and the base query is
//! narrowed by id membership. Compilation allocates a fresh table alias per
//! subquery, so predicates from different calls can never constrain each
//! other.
//!
//! Ordinary scalar-column narrowing ([`Query::filter`]) stays a plain
//! conjunct with no aliasing machinery.

use crate::core::{DbError, Result, Value};
use crate::lookup::{self, FilterValue, Lookup, Predicate, compile_lookup_sql, eval_scalar_lookup};
use crate::path::KeyAccessor;
use crate::storage::{StoredRow, Table};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;

static NULL_CELL: Value = Value::Null;

/// An immutable, chainable query over one table. Every filtering call
/// returns a new value; a `Query` is never mutated in place.
#[derive(Debug, Clone)]
pub struct Query {
    table: Arc<Table>,
    clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
enum Clause {
    /// Plain conjunctive narrowing on a scalar column.
    Column(ColumnPredicate),
    /// "id is in the result of the narrowed reference" membership test.
    IdIn(IdSubquery),
}

#[derive(Debug, Clone)]
struct ColumnPredicate {
    column: String,
    lookup: Lookup,
    value: FilterValue,
}

#[derive(Debug, Clone)]
struct IdSubquery {
    /// Snapshot of the base query's clauses at the time of the call.
    clauses: Vec<Clause>,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Default)]
struct AliasGenerator {
    next: usize,
}

impl AliasGenerator {
    fn next_alias(&mut self) -> String {
        let alias = format!("t{}", self.next);
        self.next += 1;
        alias
    }
}

impl Query {
    pub fn new(table: Arc<Table>) -> Self {
        Self {
            table,
            clauses: Vec::new(),
        }
    }

    /// Ordinary narrowing on a scalar column. Keys have the shape
    /// `<column>` or `<column>__<lookup>`; an unknown lookup name fails
    /// here.
    pub fn filter(&self, key: &str, value: impl Into<FilterValue>) -> Result<Query> {
        let clause = Clause::Column(parse_column_filter(key, value.into())?);
        Ok(self.with_clause(clause))
    }

    /// Narrow by a document predicate. Keys have the shape
    /// `<column>__<segment>[__<segment>...][__<lookup>]`; the lookup
    /// defaults to `exact`, and a trailing name the registry does not know
    /// is treated as one more key segment.
    pub fn filter_json(&self, key: &str, value: impl Into<FilterValue>) -> Result<Query> {
        self.filter_json_all(&[(key, value.into())])
    }

    /// Apply several document predicates in one call (AND semantics within
    /// the call, one shared fresh reference).
    pub fn filter_json_all(&self, entries: &[(&str, FilterValue)]) -> Result<Query> {
        let mut predicates = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            predicates.push(parse_json_filter(key, value.clone())?);
        }
        Ok(self.apply_json_predicates(predicates))
    }

    /// The combinator itself: predicates go against an internal copy of the
    /// base query, the copy is projected to ids, and the base query is
    /// narrowed by membership in that id set.
    pub fn apply_json_predicates(&self, predicates: Vec<Predicate>) -> Query {
        let subquery = IdSubquery {
            clauses: self.clauses.clone(),
            predicates,
        };
        self.with_clause(Clause::IdIn(subquery))
    }

    fn with_clause(&self, clause: Clause) -> Query {
        let mut clauses = self.clauses.clone();
        clauses.push(clause);
        Query {
            table: Arc::clone(&self.table),
            clauses,
        }
    }

    /// Compile to SQL: the full statement plus ordered bound parameters.
    pub fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        let mut aliases = AliasGenerator::default();
        let alias = aliases.next_alias();
        let mut params = Vec::new();
        let mut conditions = Vec::new();
        for clause in &self.clauses {
            conditions.push(compile_clause(
                self.table.name(),
                clause,
                &alias,
                &mut aliases,
                &mut params,
            )?);
        }

        let mut sql = format!("SELECT {a}.* FROM \"{t}\" {a}", a = alias, t = self.table.name());
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        debug!("compiled query: {}", sql);
        Ok((sql, params))
    }

    /// Row ids matching the query, evaluated against the in-memory store.
    pub fn ids(&self) -> Result<BTreeSet<i64>> {
        eval_clauses(&self.table, &self.clauses)
    }

    pub fn execute(&self) -> Result<Vec<StoredRow>> {
        let ids = self.ids()?;
        Ok(self
            .table
            .rows()
            .iter()
            .filter(|row| ids.contains(&row.id()))
            .cloned()
            .collect())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.ids()?.len())
    }
}

fn parse_column_filter(key: &str, value: FilterValue) -> Result<ColumnPredicate> {
    let parts: Vec<&str> = key.split("__").collect();
    match parts.as_slice() {
        [column] => Ok(ColumnPredicate {
            column: column.to_string(),
            lookup: Lookup::Exact,
            value,
        }),
        [column, lookup_name] => {
            let lookup = lookup::resolve_lookup(lookup_name).ok_or_else(|| {
                DbError::UnsupportedOperation(format!(
                    "Unknown lookup '{}' in filter '{}'",
                    lookup_name, key
                ))
            })?;
            Ok(ColumnPredicate {
                column: column.to_string(),
                lookup,
                value,
            })
        }
        _ => Err(DbError::UnsupportedOperation(format!(
            "Filter '{}' addresses a document path; use filter_json",
            key
        ))),
    }
}

fn parse_json_filter(key: &str, value: FilterValue) -> Result<Predicate> {
    let mut parts: Vec<&str> = key.split("__").collect();
    if parts.len() < 2 {
        return Err(DbError::UnsupportedOperation(format!(
            "JSON filter '{}' needs at least one key segment",
            key
        )));
    }

    // The trailing name is an operator only when the registry knows it and
    // at least one segment remains; otherwise it is a key. Default is
    // equality.
    let lookup = if parts.len() > 2 {
        match lookup::resolve_lookup(parts[parts.len() - 1]) {
            Some(lookup) => {
                parts.pop();
                lookup
            }
            None => Lookup::Exact,
        }
    } else {
        Lookup::Exact
    };

    let accessor = KeyAccessor::from_path(parts[0], &parts[1..]);
    Ok(Predicate::new(accessor, lookup, value))
}

fn compile_clause(
    table: &str,
    clause: &Clause,
    alias: &str,
    aliases: &mut AliasGenerator,
    params: &mut Vec<Value>,
) -> Result<String> {
    match clause {
        Clause::Column(cp) => {
            let lhs = format!("{}.\"{}\"", alias, cp.column);
            compile_lookup_sql(&lhs, cp.lookup, &cp.value, params)
        }
        Clause::IdIn(sub) => {
            let inner = aliases.next_alias();
            let mut conditions = Vec::new();
            for clause in &sub.clauses {
                conditions.push(compile_clause(table, clause, &inner, aliases, params)?);
            }
            for predicate in &sub.predicates {
                let (sql, mut predicate_params) = predicate.to_sql(&inner)?;
                params.append(&mut predicate_params);
                conditions.push(sql);
            }

            let mut subquery = format!("SELECT {a}.\"id\" FROM \"{t}\" {a}", a = inner, t = table);
            if !conditions.is_empty() {
                subquery.push_str(" WHERE ");
                subquery.push_str(&conditions.join(" AND "));
            }
            Ok(format!("{}.\"id\" IN ({})", alias, subquery))
        }
    }
}

fn eval_clauses(table: &Table, clauses: &[Clause]) -> Result<BTreeSet<i64>> {
    let mut ids: BTreeSet<i64> = table.rows().iter().map(|row| row.id()).collect();
    for clause in clauses {
        let matched = match clause {
            Clause::Column(cp) => {
                let mut set = BTreeSet::new();
                for row in table.rows() {
                    let cell = row.get(&cp.column).unwrap_or(&NULL_CELL);
                    if eval_scalar_lookup(cp.lookup, cell, &cp.value)? {
                        set.insert(row.id());
                    }
                }
                set
            }
            Clause::IdIn(sub) => eval_subquery(table, sub)?,
        };
        ids = ids.intersection(&matched).copied().collect();
    }
    Ok(ids)
}

fn eval_subquery(table: &Table, sub: &IdSubquery) -> Result<BTreeSet<i64>> {
    let base = eval_clauses(table, &sub.clauses)?;
    let mut ids = BTreeSet::new();
    'rows: for row in table.rows() {
        if !base.contains(&row.id()) {
            continue;
        }
        for predicate in &sub.predicates {
            let document = row.document(predicate.accessor().column())?;
            if !predicate.matches(&document)? {
                continue 'rows;
            }
        }
        ids.insert(row.id());
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RowValues;
    use serde_json::json;

    fn people() -> Arc<Table> {
        let mut table = Table::new("people");
        table.insert(
            RowValues::new()
                .set("name", "alice")
                .set_document("json_data", &json!({"city": "london", "age": 30}))
                .unwrap(),
        );
        table.insert(
            RowValues::new()
                .set("name", "bob")
                .set_document("json_data", &json!({"city": "paris", "age": 25}))
                .unwrap(),
        );
        Arc::new(table)
    }

    #[test]
    fn test_filter_json_is_an_immutable_update() {
        let base = Query::new(people());
        let narrowed = base.filter_json("json_data__city", "london").unwrap();
        assert_eq!(base.count().unwrap(), 2);
        assert_eq!(narrowed.count().unwrap(), 1);
    }

    #[test]
    fn test_each_call_gets_a_fresh_alias() {
        let query = Query::new(people())
            .filter_json("json_data__city", "london")
            .unwrap()
            .filter_json("json_data__age__gte", 18)
            .unwrap();
        let (sql, _) = query.to_sql().unwrap();
        assert!(sql.contains("FROM \"people\" t0"));
        assert!(sql.contains("FROM \"people\" t1"));
        assert!(sql.contains("FROM \"people\" t2"));
        assert!(sql.contains("t0.\"id\" IN (SELECT t1.\"id\""));
    }

    #[test]
    fn test_unknown_column_lookup_fails() {
        let err = Query::new(people()).filter("name__wibble", "x").unwrap_err();
        assert!(matches!(err, DbError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_trailing_unknown_name_is_a_segment() {
        // "shape" is not a registered lookup, so it resolves as a key.
        let query = Query::new(people())
            .filter_json("json_data__city__shape", "round")
            .unwrap();
        assert_eq!(query.count().unwrap(), 0);
        let (sql, _) = query.to_sql().unwrap();
        assert!(sql.contains("(t1.\"json_data\".\"city\".\"shape\") = ?"));
    }

    #[test]
    fn test_parameters_follow_placeholder_order() {
        let query = Query::new(people())
            .filter("name", "alice")
            .unwrap()
            .filter_json("json_data__age__gt", 10)
            .unwrap();
        let (sql, params) = query.to_sql().unwrap();
        assert_eq!(sql.matches('?').count(), 3);
        // Subquery repeats the base clause before the document predicate.
        assert_eq!(
            params,
            vec![
                Value::Text("alice".into()),
                Value::Text("alice".into()),
                Value::Integer(10),
            ]
        );
    }
}
