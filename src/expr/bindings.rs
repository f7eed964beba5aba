//! Bound-variable resolution
//!
//! Markers in the predicate tree are positional; the session layer supplies
//! their concrete values at range-computation time.

use super::ast::Term;
use super::value::Value;

/// Resolved bound-variable values, indexed by marker position
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: Vec<Value>,
}

impl Bindings {
    /// Creates an empty binding set (for queries without markers)
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a binding set from positional values
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Returns the value bound at the given marker position
    pub fn get(&self, marker: usize) -> Option<&Value> {
        self.values.get(marker)
    }

    /// Number of bound values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no values are bound
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolves a term to a concrete value.
    ///
    /// Returns `None` for a marker with no bound value; literals always
    /// resolve.
    pub fn resolve(&self, term: &Term) -> Option<Value> {
        match term {
            Term::Literal(v) => Some(v.clone()),
            Term::Marker(i) => self.get(*i).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_literal_and_marker() {
        let bindings = Bindings::new(vec![Value::Int(42)]);
        assert_eq!(
            bindings.resolve(&Term::Literal(Value::Int(1))),
            Some(Value::Int(1))
        );
        assert_eq!(bindings.resolve(&Term::Marker(0)), Some(Value::Int(42)));
        assert_eq!(bindings.resolve(&Term::Marker(1)), None);
    }
}
