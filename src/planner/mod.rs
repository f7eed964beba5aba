//! Restriction classification and scan planning for keyplan
//!
//! The planner classifies a where-clause conjunction against a table's key
//! structure, decides how the query can physically be answered (key ranges,
//! a secondary index, or post-scan filtering), and computes the concrete
//! ranges to scan.
//!
//! # Design Principles
//!
//! - Deterministic: same schema, predicates, and catalog -> same plan
//! - Never under-restrict: a scan may be widened, filtering re-checks it
//! - One-shot classification: the result is immutable; index-table
//!   preparation is a typed transition, not a mutation
//! - Invalid requests fail at preparation time, never at execution
//!
//! # Pipeline
//!
//! 1. [`QueryRestrictions::classify`] buckets and validates the predicates
//! 2. Index selection runs once over the finished buckets
//! 3. `prepare_indexed_local` / `prepare_indexed_global` derive the
//!    index-table prefix when an index drives the query
//! 4. Range computation runs at execution time with resolved bindings

mod classifier;
mod combinations;
mod errors;
mod explain;
mod filtering;
mod indexed;
mod prefix;
mod ranges;
mod restrictions;
mod selector;

pub use combinations::Combinations;
pub use errors::{RestrictionError, RestrictionResult};
pub use explain::RestrictionsSummary;
pub use indexed::{IdxPrefixElement, IndexQueryRestrictions, IndexTableMode};
pub use prefix::{ColumnRestriction, PrefixElement, Shape};
pub use ranges::{ClusteringRange, PartitionKey, PartitionScan, RangeBound};
pub use restrictions::{
    ChosenIndex, ClassifyOptions, ClusteringRestrictions, PartitionRestrictions,
    QueryRestrictions, StatementKind, TokenRestriction,
};
