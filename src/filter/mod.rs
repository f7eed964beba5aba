//! Row-level predicate re-evaluation
//!
//! The filtering phase re-checks predicates that could not be expressed as a
//! scan range or index lookup. Matching is strict: no type coercion, missing
//! columns and nulls never match.
//!
//! # Design Principles
//!
//! - False negatives forbidden: a row a range scan would return must match
//! - AND semantics across atoms, same as classification assumes
//! - Token atoms are always range-served and are skipped here

use std::collections::BTreeMap;

use regex::Regex;

use crate::expr::{Atom, Bindings, Lhs, Operator, Rhs, Term, Value};

/// A materialized row as seen by the filtering phase
pub type Row = BTreeMap<String, Value>;

/// Evaluates restriction atoms against rows
pub struct RowFilter;

impl RowFilter {
    /// Checks whether a row satisfies every atom
    pub fn matches(row: &Row, atoms: &[Atom], bindings: &Bindings) -> bool {
        atoms.iter().all(|atom| Self::matches_atom(row, atom, bindings))
    }

    /// Checks whether a row satisfies a single atom
    pub fn matches_atom(row: &Row, atom: &Atom, bindings: &Bindings) -> bool {
        match &atom.lhs {
            // token comparisons are served by the partition scan itself
            Lhs::Token(_) => true,
            Lhs::Column(column) => Self::matches_column(row, column, atom, bindings),
            Lhs::Tuple(columns) => Self::matches_tuple(row, columns, atom, bindings),
        }
    }

    fn matches_column(row: &Row, column: &str, atom: &Atom, bindings: &Bindings) -> bool {
        if atom.op == Operator::IsNotNull {
            return row.get(column).map(|v| !v.is_null()).unwrap_or(false);
        }
        let Some(actual) = row.get(column) else {
            return false;
        };
        if actual.is_null() {
            return false;
        }
        match (&atom.op, &atom.rhs) {
            (Operator::Eq, Rhs::Term(t)) => Self::resolved(bindings, t)
                .map(|expected| Self::strict_eq(actual, &expected))
                .unwrap_or(false),
            (Operator::In, Rhs::List(terms)) => terms.iter().any(|t| {
                Self::resolved(bindings, t)
                    .map(|expected| Self::strict_eq(actual, &expected))
                    .unwrap_or(false)
            }),
            (op, Rhs::Term(t)) if op.is_slice() => Self::resolved(bindings, t)
                .map(|bound| Self::ordered_match(actual, &bound, *op))
                .unwrap_or(false),
            (Operator::Contains, Rhs::Term(t)) => Self::resolved(bindings, t)
                .map(|needle| Self::contains_match(actual, &needle))
                .unwrap_or(false),
            (Operator::ContainsKey, Rhs::Term(t)) => Self::resolved(bindings, t)
                .map(|needle| Self::contains_key_match(actual, &needle))
                .unwrap_or(false),
            (Operator::Like, Rhs::Term(t)) => Self::resolved(bindings, t)
                .map(|pattern| Self::like_match(actual, &pattern))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn matches_tuple(row: &Row, columns: &[String], atom: &Atom, bindings: &Bindings) -> bool {
        let mut actual = Vec::with_capacity(columns.len());
        for column in columns {
            match row.get(column) {
                Some(v) if !v.is_null() => actual.push(v.clone()),
                _ => return false,
            }
        }
        let resolve_tuple = |terms: &[Term]| -> Option<Vec<Value>> {
            terms
                .iter()
                .map(|t| Self::resolved(bindings, t))
                .collect::<Option<Vec<_>>>()
        };
        match (&atom.op, &atom.rhs) {
            (Operator::Eq, Rhs::Tuple(terms)) => resolve_tuple(terms)
                .map(|expected| actual == expected)
                .unwrap_or(false),
            (Operator::In, Rhs::TupleList(tuples)) => tuples.iter().any(|terms| {
                resolve_tuple(terms)
                    .map(|expected| actual == expected)
                    .unwrap_or(false)
            }),
            (op, Rhs::Tuple(terms)) if op.is_slice() => resolve_tuple(terms)
                .map(|bound| {
                    // lexicographic comparison over the bound's width
                    let truncated: Vec<Value> =
                        actual.iter().take(bound.len()).cloned().collect();
                    match op {
                        Operator::Lt => truncated < bound,
                        Operator::Lte => truncated <= bound,
                        Operator::Gt => truncated > bound,
                        Operator::Gte => truncated >= bound,
                        _ => false,
                    }
                })
                .unwrap_or(false),
            _ => false,
        }
    }

    fn resolved(bindings: &Bindings, term: &Term) -> Option<Value> {
        bindings.resolve(term)
    }

    /// Exact equality, same type only
    fn strict_eq(actual: &Value, expected: &Value) -> bool {
        std::mem::discriminant(actual) == std::mem::discriminant(expected) && actual == expected
    }

    /// Ordered comparison, same type only
    fn ordered_match(actual: &Value, bound: &Value, op: Operator) -> bool {
        if std::mem::discriminant(actual) != std::mem::discriminant(bound) {
            return false;
        }
        match op {
            Operator::Lt => actual < bound,
            Operator::Lte => actual <= bound,
            Operator::Gt => actual > bound,
            Operator::Gte => actual >= bound,
            _ => false,
        }
    }

    /// Collection containment: list/set elements, map values
    fn contains_match(actual: &Value, needle: &Value) -> bool {
        match actual {
            Value::List(items) | Value::Set(items) => {
                items.iter().any(|v| Self::strict_eq(v, needle))
            }
            Value::Map(pairs) => pairs.iter().any(|(_, v)| Self::strict_eq(v, needle)),
            _ => false,
        }
    }

    /// Map key containment
    fn contains_key_match(actual: &Value, needle: &Value) -> bool {
        match actual {
            Value::Map(pairs) => pairs.iter().any(|(k, _)| Self::strict_eq(k, needle)),
            _ => false,
        }
    }

    /// Wildcard match: `%` matches any run, `_` matches one character
    fn like_match(actual: &Value, pattern: &Value) -> bool {
        let (Value::Text(text), Value::Text(pattern)) = (actual, pattern) else {
            return false;
        };
        match Regex::new(&Self::like_to_regex(pattern)) {
            Ok(re) => re.is_match(text),
            Err(_) => false,
        }
    }

    /// Translates a wildcard pattern into an anchored regex
    fn like_to_regex(pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() + 2);
        out.push('^');
        for c in pattern.chars() {
            match c {
                '%' => out.push_str(".*"),
                '_' => out.push('.'),
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }
        out.push('$');
        out
    }
}
