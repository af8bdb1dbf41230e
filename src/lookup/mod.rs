//! Lookup operators and their specialization onto typed key accessors.
//!
//! Every lookup belongs to one of two families. The text family compares
//! the stored (serialized) representation of a leaf; the numeric family
//! coerces the leaf to a number first. Specialization is the pure dispatch
//! in [`Lookup::required_type`]: the accessor is always rebound to the
//! family's type before the comparison is built.

mod predicate;

pub use predicate::{FilterValue, Predicate};
pub(crate) use predicate::{compile_lookup_sql, eval_scalar_lookup};

use crate::path::AccessorType;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// A comparison or string-match operator on a key path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Regex,
    IRegex,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
}

impl Lookup {
    /// Name used in the `<column>__<segment>__<lookup>` filter surface.
    pub fn name(&self) -> &'static str {
        match self {
            Lookup::Exact => "exact",
            Lookup::IExact => "iexact",
            Lookup::Contains => "contains",
            Lookup::IContains => "icontains",
            Lookup::StartsWith => "startswith",
            Lookup::IStartsWith => "istartswith",
            Lookup::EndsWith => "endswith",
            Lookup::IEndsWith => "iendswith",
            Lookup::Regex => "regex",
            Lookup::IRegex => "iregex",
            Lookup::Gt => "gt",
            Lookup::Gte => "gte",
            Lookup::Lt => "lt",
            Lookup::Lte => "lte",
            Lookup::In => "in",
            Lookup::IsNull => "isnull",
        }
    }

    const ALL: [Lookup; 16] = [
        Lookup::Exact,
        Lookup::IExact,
        Lookup::Contains,
        Lookup::IContains,
        Lookup::StartsWith,
        Lookup::IStartsWith,
        Lookup::EndsWith,
        Lookup::IEndsWith,
        Lookup::Regex,
        Lookup::IRegex,
        Lookup::Gt,
        Lookup::Gte,
        Lookup::Lt,
        Lookup::Lte,
        Lookup::In,
        Lookup::IsNull,
    ];

    /// Accessor type this lookup must compare through.
    pub fn required_type(&self) -> AccessorType {
        match self {
            Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte => AccessorType::Numeric,
            _ => AccessorType::Text,
        }
    }
}

/// Build the lookup registry. Runs once; the table is never mutated
/// afterwards.
fn build_lookup_registry() -> HashMap<&'static str, Lookup> {
    let mut registry = HashMap::with_capacity(Lookup::ALL.len());
    for lookup in Lookup::ALL {
        registry.insert(lookup.name(), lookup);
    }
    registry
}

lazy_static! {
    static ref LOOKUP_REGISTRY: HashMap<&'static str, Lookup> = build_lookup_registry();
}

/// Resolve a lookup by its registered name. `None` for unknown names; the
/// caller decides whether that is a path segment or an error.
pub fn resolve_lookup(name: &str) -> Option<Lookup> {
    LOOKUP_REGISTRY.get(name).copied()
}
