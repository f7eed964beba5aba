//! Per-column restriction conjunctions and clustering prefix elements
//!
//! A clustering prefix is a run of elements where every element but the last
//! pins its column(s) to exact values and only the last may carry a bounded
//! range. The prefix shape is what lets the scan stay a contiguous range per
//! enumerated combination.

use std::fmt;

use crate::expr::{Atom, Operator, Rhs, Term};

/// All atoms restricting one column, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRestriction {
    /// Restricted column
    pub column: String,
    /// The atoms forming the conjunction
    pub atoms: Vec<Atom>,
}

/// The combined shape of one column's restriction conjunction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Exactly one equality or set-membership atom
    Exact,
    /// At most one bound per direction, nothing else
    Slice,
    /// Anything else; only answerable by row filtering
    Irregular,
}

impl ColumnRestriction {
    /// Creates an empty restriction for the column
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            atoms: Vec::new(),
        }
    }

    /// Appends an atom to the conjunction
    pub fn push(&mut self, atom: Atom) {
        self.atoms.push(atom);
    }

    /// Returns the equality term, if a single-column eq atom is present
    pub fn eq_term(&self) -> Option<&Term> {
        self.atoms.iter().find_map(|a| match (&a.op, &a.rhs) {
            (Operator::Eq, Rhs::Term(t)) => Some(t),
            _ => None,
        })
    }

    /// Returns the IN list terms, if a set-membership atom is present
    pub fn in_terms(&self) -> Option<&[Term]> {
        self.atoms.iter().find_map(|a| match (&a.op, &a.rhs) {
            (Operator::In, Rhs::List(terms)) => Some(terms.as_slice()),
            _ => None,
        })
    }

    /// Returns the lower-bound term and its inclusivity, if present
    pub fn lower(&self) -> Option<(&Term, bool)> {
        self.atoms.iter().find_map(|a| match (&a.op, &a.rhs) {
            (op, Rhs::Term(t)) if op.is_lower_bound() => Some((t, op.is_inclusive())),
            _ => None,
        })
    }

    /// Returns the upper-bound term and its inclusivity, if present
    pub fn upper(&self) -> Option<(&Term, bool)> {
        self.atoms.iter().find_map(|a| match (&a.op, &a.rhs) {
            (op, Rhs::Term(t)) if op.is_upper_bound() => Some((t, op.is_inclusive())),
            _ => None,
        })
    }

    /// Returns true if any atom uses a bounded-range operator
    pub fn has_slice(&self) -> bool {
        self.atoms.iter().any(|a| a.op.is_slice())
    }

    /// Returns true if any atom is an equality
    pub fn has_eq(&self) -> bool {
        self.atoms.iter().any(|a| a.op == Operator::Eq)
    }

    /// Returns true if any atom is a set membership
    pub fn has_in(&self) -> bool {
        self.atoms.iter().any(|a| a.op == Operator::In)
    }

    /// Returns true if any atom is containment or pattern match
    pub fn has_filtering_only_op(&self) -> bool {
        self.atoms
            .iter()
            .any(|a| a.op.is_containment() || a.op == Operator::Like)
    }

    /// Classifies the conjunction's combined shape
    pub fn shape(&self) -> Shape {
        let eq = self.atoms.iter().filter(|a| a.op == Operator::Eq).count();
        let in_ = self.atoms.iter().filter(|a| a.op == Operator::In).count();
        let lower = self
            .atoms
            .iter()
            .filter(|a| a.op.is_lower_bound())
            .count();
        let upper = self
            .atoms
            .iter()
            .filter(|a| a.op.is_upper_bound())
            .count();

        if self.has_filtering_only_op() {
            return Shape::Irregular;
        }
        if eq + in_ > 1 || ((eq + in_ == 1) && (lower + upper > 0)) {
            return Shape::Irregular;
        }
        if lower > 1 || upper > 1 {
            return Shape::Irregular;
        }
        if eq + in_ == 1 {
            Shape::Exact
        } else if lower + upper > 0 {
            Shape::Slice
        } else {
            Shape::Irregular
        }
    }
}

impl fmt::Display for ColumnRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", atom)?;
        }
        Ok(())
    }
}

/// One element of a clustering prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixElement {
    /// One column's conjunction (single-column case)
    Single(ColumnRestriction),
    /// A tuple restriction covering consecutive clustering columns
    /// (multi-column case): one eq/in atom, or up to one bound per direction
    Multi {
        /// Covered columns, in clustering order
        columns: Vec<String>,
        /// The tuple atoms
        atoms: Vec<Atom>,
    },
}

impl PrefixElement {
    /// Number of clustering columns this element covers
    pub fn width(&self) -> usize {
        match self {
            PrefixElement::Single(_) => 1,
            PrefixElement::Multi { columns, .. } => columns.len(),
        }
    }

    /// Covered column names, in clustering order
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrefixElement::Single(r) => vec![r.column.as_str()],
            PrefixElement::Multi { columns, .. } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Returns true when the element pins exact values (eq or in only)
    pub fn is_exact(&self) -> bool {
        match self {
            PrefixElement::Single(r) => r.shape() == Shape::Exact,
            PrefixElement::Multi { atoms, .. } => atoms
                .iter()
                .all(|a| matches!(a.op, Operator::Eq | Operator::In)),
        }
    }

    /// Returns true when the element carries a bounded range
    pub fn has_slice(&self) -> bool {
        match self {
            PrefixElement::Single(r) => r.has_slice(),
            PrefixElement::Multi { atoms, .. } => atoms.iter().any(|a| a.op.is_slice()),
        }
    }

    /// The element's atoms
    pub fn atoms(&self) -> &[Atom] {
        match self {
            PrefixElement::Single(r) => &r.atoms,
            PrefixElement::Multi { atoms, .. } => atoms,
        }
    }
}

impl fmt::Display for PrefixElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixElement::Single(r) => write!(f, "{}", r),
            PrefixElement::Multi { atoms, .. } => {
                for (i, atom) in atoms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{}", atom)?;
                }
                Ok(())
            }
        }
    }
}
