use super::Lookup;
use crate::core::{DbError, Result, Value};
use crate::expression::{escape_like, eval_like, eval_regex};
use crate::path::KeyAccessor;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Comparison value for a filter: a single value, or a candidate list for
/// the `in` lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Single(Value),
    List(Vec<Value>),
}

impl From<Value> for FilterValue {
    fn from(v: Value) -> Self {
        Self::Single(v)
    }
}

impl From<i64> for FilterValue {
    fn from(i: i64) -> Self {
        Self::Single(Value::Integer(i))
    }
}

impl From<i32> for FilterValue {
    fn from(i: i32) -> Self {
        Self::Single(Value::Integer(i as i64))
    }
}

impl From<f64> for FilterValue {
    fn from(f: f64) -> Self {
        Self::Single(Value::Float(f))
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::Single(Value::Text(s.to_string()))
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::Single(Value::Text(s))
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Single(Value::Boolean(b))
    }
}

impl From<Vec<Value>> for FilterValue {
    fn from(values: Vec<Value>) -> Self {
        Self::List(values)
    }
}

/// A lookup bound to a typed key accessor and a comparison value.
///
/// Created per filter call and consumed by compilation; never mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct Predicate {
    accessor: KeyAccessor,
    lookup: Lookup,
    value: FilterValue,
}

impl Predicate {
    /// Bind a lookup to an accessor. The accessor is rebound to the lookup's
    /// required type before the comparison is built; comparing through the
    /// generic accessor gives wrong results once storage representations
    /// differ.
    pub fn new(accessor: KeyAccessor, lookup: Lookup, value: FilterValue) -> Self {
        let accessor = accessor.rebind(lookup.required_type());
        Self {
            accessor,
            lookup,
            value,
        }
    }

    pub fn accessor(&self) -> &KeyAccessor {
        &self.accessor
    }

    pub fn lookup(&self) -> Lookup {
        self.lookup
    }

    /// SQL fragment plus ordered bound parameters, against an aliased table
    /// reference.
    pub fn to_sql(&self, alias: &str) -> Result<(String, Vec<Value>)> {
        let lhs = self.accessor.to_sql(alias);
        let mut params = Vec::new();
        let sql = compile_lookup_sql(&lhs, self.lookup, &self.value, &mut params)?;
        Ok((sql, params))
    }

    /// Reference semantics: evaluate the predicate against a deserialized
    /// document. Mirrors what the generated SQL does on the database side,
    /// including execution-time type errors for numeric lookups over
    /// non-numeric leaves.
    pub fn matches(&self, document: &JsonValue) -> Result<bool> {
        let leaf = self.accessor.resolve_in(document);
        let leaf_is_null = matches!(leaf, None | Some(JsonValue::Null));

        match self.lookup {
            // A missing key and an explicit null are indistinguishable here;
            // both collapse to "null".
            Lookup::IsNull => {
                let expected = expect_bool(&self.value)?;
                Ok(leaf_is_null == expected)
            }
            Lookup::Exact if matches!(self.value, FilterValue::Single(Value::Null)) => {
                Ok(leaf_is_null)
            }
            _ if leaf_is_null => Ok(false),
            Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte => {
                let left = leaf_number(leaf.unwrap(), &self.accessor)?;
                let right = expect_number(&self.value)?;
                Ok(eval_numeric_lookup(self.lookup, left, right))
            }
            _ => {
                let text = leaf_text(leaf.unwrap());
                eval_text_lookup(self.lookup, &text, &self.value)
            }
        }
    }
}

/// Canonical serialized text of a document leaf. Strings drop their quotes;
/// every other leaf keeps its JSON form (`true`, `33`, `3.14`).
fn leaf_text(leaf: &JsonValue) -> String {
    match leaf {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce a document leaf to a number, the in-memory analogue of
/// `TO_NUMBER(...)`. Fails at execution time, never at compile time.
fn leaf_number(leaf: &JsonValue, accessor: &KeyAccessor) -> Result<f64> {
    match leaf {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| {
            DbError::TypeMismatch(format!("Number out of range at path '{}'", accessor.dotted()))
        }),
        JsonValue::String(s) => s.trim().parse::<f64>().map_err(|_| {
            DbError::TypeMismatch(format!(
                "Cannot convert '{}' at path '{}' to a number",
                s,
                accessor.dotted()
            ))
        }),
        other => Err(DbError::TypeMismatch(format!(
            "Cannot convert {} at path '{}' to a number",
            other,
            accessor.dotted()
        ))),
    }
}

fn expect_bool(value: &FilterValue) -> Result<bool> {
    match value {
        FilterValue::Single(Value::Boolean(b)) => Ok(*b),
        other => Err(DbError::TypeMismatch(format!(
            "isnull requires a boolean, got {:?}",
            other
        ))),
    }
}

fn expect_number(value: &FilterValue) -> Result<f64> {
    match value {
        FilterValue::Single(v) => v.as_f64().ok_or_else(|| {
            DbError::TypeMismatch(format!(
                "Numeric comparison requires a numeric value, got {}",
                v.type_name()
            ))
        }),
        FilterValue::List(_) => Err(DbError::UnsupportedOperation(
            "Numeric comparison does not accept a value list".into(),
        )),
    }
}

fn single_param<'a>(lookup: Lookup, value: &'a FilterValue) -> Result<&'a Value> {
    match value {
        FilterValue::Single(v) => Ok(v),
        FilterValue::List(_) => Err(DbError::UnsupportedOperation(format!(
            "Lookup '{}' does not accept a value list",
            lookup.name()
        ))),
    }
}

fn pattern_param(lookup: Lookup, value: &FilterValue) -> Result<String> {
    single_param(lookup, value)?.stored_text().ok_or_else(|| {
        DbError::TypeMismatch(format!("Lookup '{}' cannot match NULL", lookup.name()))
    })
}

pub(crate) fn eval_numeric_lookup(lookup: Lookup, left: f64, right: f64) -> bool {
    match lookup {
        Lookup::Gt => left > right,
        Lookup::Gte => left >= right,
        Lookup::Lt => left < right,
        Lookup::Lte => left <= right,
        _ => unreachable!("not a numeric-family lookup"),
    }
}

/// Text-family evaluation over the stored representation of a leaf or cell.
pub(crate) fn eval_text_lookup(lookup: Lookup, text: &str, value: &FilterValue) -> Result<bool> {
    if let Lookup::In = lookup {
        let FilterValue::List(candidates) = value else {
            return Err(DbError::UnsupportedOperation(
                "Lookup 'in' requires a value list".into(),
            ));
        };
        // NULL candidates never match, per SQL IN semantics.
        return Ok(candidates
            .iter()
            .filter_map(|c| c.stored_text())
            .any(|c| c == text));
    }

    let param = pattern_param(lookup, value)?;
    match lookup {
        Lookup::Exact => Ok(text == param),
        Lookup::IExact => eval_like(text, &escape_like(&param), false),
        Lookup::Contains => eval_like(text, &format!("%{}%", escape_like(&param)), true),
        Lookup::IContains => eval_like(text, &format!("%{}%", escape_like(&param)), false),
        Lookup::StartsWith => eval_like(text, &format!("{}%", escape_like(&param)), true),
        Lookup::IStartsWith => eval_like(text, &format!("{}%", escape_like(&param)), false),
        Lookup::EndsWith => eval_like(text, &format!("%{}", escape_like(&param)), true),
        Lookup::IEndsWith => eval_like(text, &format!("%{}", escape_like(&param)), false),
        Lookup::Regex => eval_regex(text, &param, true),
        Lookup::IRegex => eval_regex(text, &param, false),
        other => Err(DbError::UnsupportedOperation(format!(
            "Lookup '{}' is not a text-family lookup",
            other.name()
        ))),
    }
}

/// Scalar-column evaluation: the same lookups applied to a plain column
/// cell instead of a document leaf.
pub(crate) fn eval_scalar_lookup(lookup: Lookup, cell: &Value, value: &FilterValue) -> Result<bool> {
    match lookup {
        Lookup::IsNull => {
            let expected = expect_bool(value)?;
            Ok(cell.is_null() == expected)
        }
        Lookup::Exact if matches!(value, FilterValue::Single(Value::Null)) => Ok(cell.is_null()),
        _ if cell.is_null() => Ok(false),
        Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte => {
            let rhs = single_param(lookup, value)?;
            if rhs.is_null() {
                return Ok(false);
            }
            let ordering = cell.compare(rhs)?;
            Ok(match lookup {
                Lookup::Gt => ordering == Ordering::Greater,
                Lookup::Gte => ordering != Ordering::Less,
                Lookup::Lt => ordering == Ordering::Less,
                Lookup::Lte => ordering != Ordering::Greater,
                _ => unreachable!(),
            })
        }
        _ => {
            let text = cell
                .stored_text()
                .expect("non-null cell always has stored text");
            eval_text_lookup(lookup, &text, value)
        }
    }
}

/// Compile one lookup into a SQL condition against an already-rendered
/// left-hand side, appending bound parameters in order.
pub(crate) fn compile_lookup_sql(
    lhs: &str,
    lookup: Lookup,
    value: &FilterValue,
    params: &mut Vec<Value>,
) -> Result<String> {
    match lookup {
        Lookup::IsNull => {
            if expect_bool(value)? {
                Ok(format!("{} IS NULL", lhs))
            } else {
                Ok(format!("{} IS NOT NULL", lhs))
            }
        }
        Lookup::In => {
            let FilterValue::List(candidates) = value else {
                return Err(DbError::UnsupportedOperation(
                    "Lookup 'in' requires a value list".into(),
                ));
            };
            if candidates.is_empty() {
                // An empty candidate list can never match.
                return Ok("0 = 1".to_string());
            }
            let placeholders = vec!["?"; candidates.len()].join(", ");
            params.extend(candidates.iter().cloned());
            Ok(format!("{} IN ({})", lhs, placeholders))
        }
        Lookup::Exact => {
            let v = single_param(lookup, value)?;
            if v.is_null() {
                return Ok(format!("{} IS NULL", lhs));
            }
            params.push(v.clone());
            Ok(format!("{} = ?", lhs))
        }
        Lookup::IExact => {
            params.push(single_param(lookup, value)?.clone());
            Ok(format!("UPPER({}) = UPPER(?)", lhs))
        }
        Lookup::Contains | Lookup::StartsWith | Lookup::EndsWith => {
            params.push(Value::Text(like_pattern(lookup, value)?));
            Ok(format!("{} LIKE ? ESCAPE '\\'", lhs))
        }
        Lookup::IContains | Lookup::IStartsWith | Lookup::IEndsWith => {
            params.push(Value::Text(like_pattern(lookup, value)?));
            Ok(format!("UPPER({}) LIKE UPPER(?) ESCAPE '\\'", lhs))
        }
        Lookup::Regex => {
            params.push(Value::Text(pattern_param(lookup, value)?));
            Ok(format!("REGEXP_LIKE({}, ?)", lhs))
        }
        Lookup::IRegex => {
            params.push(Value::Text(pattern_param(lookup, value)?));
            Ok(format!("REGEXP_LIKE({}, ?, 'i')", lhs))
        }
        Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte => {
            let v = single_param(lookup, value)?;
            params.push(v.clone());
            let op = match lookup {
                Lookup::Gt => ">",
                Lookup::Gte => ">=",
                Lookup::Lt => "<",
                Lookup::Lte => "<=",
                _ => unreachable!(),
            };
            Ok(format!("{} {} ?", lhs, op))
        }
    }
}

fn like_pattern(lookup: Lookup, value: &FilterValue) -> Result<String> {
    let literal = escape_like(&pattern_param(lookup, value)?);
    Ok(match lookup {
        Lookup::Contains | Lookup::IContains => format!("%{}%", literal),
        Lookup::StartsWith | Lookup::IStartsWith => format!("{}%", literal),
        Lookup::EndsWith | Lookup::IEndsWith => format!("%{}", literal),
        _ => unreachable!("not a LIKE lookup"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::AccessorType;
    use serde_json::json;

    fn accessor(segments: &[&str]) -> KeyAccessor {
        KeyAccessor::from_path("json_data", segments)
    }

    #[test]
    fn test_rebind_before_compare() {
        let p = Predicate::new(accessor(&["age"]), Lookup::Gt, 18.into());
        assert_eq!(p.accessor().accessor_type(), AccessorType::Numeric);

        let p = Predicate::new(accessor(&["age"]), Lookup::Exact, 18.into());
        assert_eq!(p.accessor().accessor_type(), AccessorType::Text);
    }

    #[test]
    fn test_exact_compares_serialized_form() {
        let doc = json!({"age": 33, "flag": true});

        let p = Predicate::new(accessor(&["age"]), Lookup::Exact, 33.into());
        assert!(p.matches(&doc).unwrap());

        // Boolean leaves compare by canonical serialized form.
        let p = Predicate::new(
            accessor(&["flag"]),
            Lookup::Exact,
            crate::document::SERIALIZED_TRUE.into(),
        );
        assert!(p.matches(&doc).unwrap());
    }

    #[test]
    fn test_in_compiles_to_single_predicate() {
        let p = Predicate::new(
            accessor(&["city"]),
            Lookup::In,
            vec![Value::from("london"), Value::from("paris")].into(),
        );
        let (sql, params) = p.to_sql("t1").unwrap();
        assert_eq!(sql, "(t1.\"json_data\".city) IN (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_numeric_lookup_sql_wraps_accessor() {
        let p = Predicate::new(accessor(&["a", "b"]), Lookup::Gte, 65.into());
        let (sql, params) = p.to_sql("t2").unwrap();
        assert_eq!(sql, "TO_NUMBER((t2.\"json_data\".\"a\".\"b\")) >= ?");
        assert_eq!(params, vec![Value::Integer(65)]);
    }

    #[test]
    fn test_isnull_conflates_missing_and_null() {
        let p = Predicate::new(accessor(&["gone"]), Lookup::IsNull, true.into());
        assert!(p.matches(&json!({})).unwrap());
        assert!(p.matches(&json!({"gone": null})).unwrap());
        assert!(!p.matches(&json!({"gone": 1})).unwrap());
    }

    #[test]
    fn test_numeric_lookup_on_text_leaf_fails_at_execution() {
        let p = Predicate::new(accessor(&["name"]), Lookup::Gt, 5.into());
        // Compilation succeeds,
        assert!(p.to_sql("t0").is_ok());
        // execution is where the coercion error surfaces.
        let err = p.matches(&json!({"name": "alice"})).unwrap_err();
        assert!(matches!(err, DbError::TypeMismatch(_)));
    }

    #[test]
    fn test_case_insensitive_text_lookups() {
        let doc = json!({"street": "Some Terrace"});
        let p = Predicate::new(accessor(&["street"]), Lookup::IContains, "terrace".into());
        assert!(p.matches(&doc).unwrap());

        let p = Predicate::new(accessor(&["street"]), Lookup::IStartsWith, "some".into());
        assert!(p.matches(&doc).unwrap());

        let p = Predicate::new(accessor(&["street"]), Lookup::Regex, "^Some".into());
        assert!(p.matches(&doc).unwrap());
    }

    #[test]
    fn test_scalar_lookup_eval() {
        assert!(eval_scalar_lookup(Lookup::Gt, &Value::Integer(10), &5.into()).unwrap());
        assert!(!eval_scalar_lookup(Lookup::Gt, &Value::Null, &5.into()).unwrap());
        assert!(eval_scalar_lookup(Lookup::IsNull, &Value::Null, &true.into()).unwrap());
        assert!(
            eval_scalar_lookup(Lookup::Contains, &Value::Text("hello".into()), &"ell".into())
                .unwrap()
        );
        assert!(
            eval_scalar_lookup(Lookup::Gt, &Value::Text("x".into()), &5.into()).is_err()
        );
    }
}
