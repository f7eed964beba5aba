//! Predicate model for keyplan
//!
//! A query's where-clause is a conjunction of atoms. Each atom compares a
//! column (or an ordered tuple of columns, or the token of the full partition
//! key) against a value, a tuple of values, or a list of either. Values may be
//! bound-variable markers resolved later through [`Bindings`].
//!
//! # Design Principles
//!
//! - Atoms are immutable once built; classification never rewrites them
//! - Conjunction only: no OR, no negation beyond IS NOT NULL
//! - Marker resolution is the only execution-time input

mod ast;
mod bindings;
mod value;

pub use ast::{Atom, Lhs, Operator, Rhs, Term};
pub use bindings::Bindings;
pub use value::Value;
