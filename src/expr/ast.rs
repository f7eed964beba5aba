//! Atom structures: one predicate per atom, conjunction across atoms

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Comparison operators supported by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equality: lhs = rhs
    Eq,
    /// Strictly less: lhs < rhs
    Lt,
    /// Less or equal: lhs <= rhs
    Lte,
    /// Strictly greater: lhs > rhs
    Gt,
    /// Greater or equal: lhs >= rhs
    Gte,
    /// Set membership: lhs IN (r1, r2, ...)
    In,
    /// Collection containment: lhs CONTAINS rhs
    Contains,
    /// Map key containment: lhs CONTAINS KEY rhs
    ContainsKey,
    /// Text wildcard match: lhs LIKE rhs
    Like,
    /// Non-null marker: lhs IS NOT NULL
    IsNotNull,
}

impl Operator {
    /// Returns true for the ordering operators
    pub fn is_slice(&self) -> bool {
        matches!(
            self,
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
        )
    }

    /// Returns true for operators that bound a range from below
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte)
    }

    /// Returns true for operators that bound a range from above
    pub fn is_upper_bound(&self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte)
    }

    /// Returns true when the bound produced by this operator is inclusive
    pub fn is_inclusive(&self) -> bool {
        matches!(self, Operator::Lte | Operator::Gte)
    }

    /// Returns true for the containment operators
    pub fn is_containment(&self) -> bool {
        matches!(self, Operator::Contains | Operator::ContainsKey)
    }

    /// Returns the operator symbol for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::In => "IN",
            Operator::Contains => "CONTAINS",
            Operator::ContainsKey => "CONTAINS KEY",
            Operator::Like => "LIKE",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A right-hand-side term: a literal value or a bound-variable marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    /// A concrete value known at preparation time
    Literal(Value),
    /// A placeholder resolved through [`super::Bindings`] at range-computation time
    Marker(usize),
}

impl Term {
    /// Returns the literal value, if this term is one
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Term::Literal(v) => Some(v),
            Term::Marker(_) => None,
        }
    }
}

impl From<Value> for Term {
    fn from(v: Value) -> Self {
        Term::Literal(v)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Literal(v) => write!(f, "{}", v),
            Term::Marker(i) => write!(f, "?{}", i),
        }
    }
}

/// The left-hand side of an atom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lhs {
    /// A single column
    Column(String),
    /// An ordered tuple of columns
    Tuple(Vec<String>),
    /// The ring token computed over the full partition key
    Token(Vec<String>),
}

impl Lhs {
    /// Returns the referenced column names in declaration order
    pub fn columns(&self) -> &[String] {
        match self {
            Lhs::Column(c) => std::slice::from_ref(c),
            Lhs::Tuple(cols) => cols,
            Lhs::Token(cols) => cols,
        }
    }
}

/// The right-hand side of an atom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rhs {
    /// No operand (IS NOT NULL)
    None,
    /// A single term
    Term(Term),
    /// A tuple of terms, matching a tuple left-hand side
    Tuple(Vec<Term>),
    /// A list of terms (single-column IN)
    List(Vec<Term>),
    /// A list of tuples (multi-column IN)
    TupleList(Vec<Vec<Term>>),
}

/// One predicate: `lhs op rhs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    /// Restricted column(s)
    pub lhs: Lhs,
    /// Comparison operator
    pub op: Operator,
    /// Compared value(s)
    pub rhs: Rhs,
}

impl Atom {
    /// Creates a single-column comparison atom
    fn single(column: impl Into<String>, op: Operator, term: Term) -> Self {
        Self {
            lhs: Lhs::Column(column.into()),
            op,
            rhs: Rhs::Term(term),
        }
    }

    /// Creates an equality atom: `column = value`
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self::single(column, Operator::Eq, Term::Literal(value))
    }

    /// Creates an equality atom against a bound-variable marker
    pub fn eq_marker(column: impl Into<String>, marker: usize) -> Self {
        Self::single(column, Operator::Eq, Term::Marker(marker))
    }

    /// Creates a `column < value` atom
    pub fn lt(column: impl Into<String>, value: Value) -> Self {
        Self::single(column, Operator::Lt, Term::Literal(value))
    }

    /// Creates a `column <= value` atom
    pub fn lte(column: impl Into<String>, value: Value) -> Self {
        Self::single(column, Operator::Lte, Term::Literal(value))
    }

    /// Creates a `column > value` atom
    pub fn gt(column: impl Into<String>, value: Value) -> Self {
        Self::single(column, Operator::Gt, Term::Literal(value))
    }

    /// Creates a `column >= value` atom
    pub fn gte(column: impl Into<String>, value: Value) -> Self {
        Self::single(column, Operator::Gte, Term::Literal(value))
    }

    /// Creates a single-column IN atom
    pub fn in_list(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            lhs: Lhs::Column(column.into()),
            op: Operator::In,
            rhs: Rhs::List(values.into_iter().map(Term::Literal).collect()),
        }
    }

    /// Creates a CONTAINS atom
    pub fn contains(column: impl Into<String>, value: Value) -> Self {
        Self::single(column, Operator::Contains, Term::Literal(value))
    }

    /// Creates a CONTAINS KEY atom
    pub fn contains_key(column: impl Into<String>, value: Value) -> Self {
        Self::single(column, Operator::ContainsKey, Term::Literal(value))
    }

    /// Creates a LIKE atom; `%` matches any run, `_` matches one character
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::single(column, Operator::Like, Term::Literal(Value::Text(pattern.into())))
    }

    /// Creates an IS NOT NULL atom
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self {
            lhs: Lhs::Column(column.into()),
            op: Operator::IsNotNull,
            rhs: Rhs::None,
        }
    }

    /// Creates a token comparison over the given partition-key columns
    pub fn token(columns: Vec<String>, op: Operator, term: Term) -> Self {
        Self {
            lhs: Lhs::Token(columns),
            op,
            rhs: Rhs::Term(term),
        }
    }

    /// Creates a multi-column equality atom: `(c1, c2) = (v1, v2)`
    pub fn tuple_eq(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            lhs: Lhs::Tuple(columns),
            op: Operator::Eq,
            rhs: Rhs::Tuple(values.into_iter().map(Term::Literal).collect()),
        }
    }

    /// Creates a multi-column IN atom
    pub fn tuple_in(columns: Vec<String>, tuples: Vec<Vec<Value>>) -> Self {
        Self {
            lhs: Lhs::Tuple(columns),
            op: Operator::In,
            rhs: Rhs::TupleList(
                tuples
                    .into_iter()
                    .map(|t| t.into_iter().map(Term::Literal).collect())
                    .collect(),
            ),
        }
    }

    /// Creates a multi-column ordering atom compared lexicographically
    pub fn tuple_slice(columns: Vec<String>, op: Operator, values: Vec<Value>) -> Self {
        Self {
            lhs: Lhs::Tuple(columns),
            op,
            rhs: Rhs::Tuple(values.into_iter().map(Term::Literal).collect()),
        }
    }

    /// Returns true for token atoms
    pub fn is_token(&self) -> bool {
        matches!(self.lhs, Lhs::Token(_))
    }

    /// Returns the column name for single-column atoms
    pub fn single_column(&self) -> Option<&str> {
        match &self.lhs {
            Lhs::Column(c) => Some(c),
            _ => None,
        }
    }

    /// Returns true if the atom references the named column
    pub fn references(&self, column: &str) -> bool {
        self.lhs.columns().iter().any(|c| c == column)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lhs {
            Lhs::Column(c) => write!(f, "{}", c)?,
            Lhs::Tuple(cols) => write!(f, "({})", cols.join(", "))?,
            Lhs::Token(cols) => write!(f, "token({})", cols.join(", "))?,
        }
        if self.op == Operator::IsNotNull {
            return write!(f, " IS NOT NULL");
        }
        write!(f, " {} ", self.op)?;
        match &self.rhs {
            Rhs::None => Ok(()),
            Rhs::Term(t) => write!(f, "{}", t),
            Rhs::Tuple(terms) => {
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            Rhs::List(terms) => {
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            Rhs::TupleList(tuples) => {
                write!(f, "(")?;
                for (i, tuple) in tuples.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "(")?;
                    for (j, t) in tuple.iter().enumerate() {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", t)?;
                    }
                    write!(f, ")")?;
                }
                write!(f, ")")
            }
        }
    }
}
