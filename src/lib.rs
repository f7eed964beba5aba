//! keyplan - restriction classification and key-range planning for wide-column tables
//!
//! Given a conjunction of predicates and a table's key layout, keyplan decides
//! how the query can physically be answered (key ranges, secondary index, or
//! post-scan filtering) and computes the concrete ranges to scan.

pub mod expr;
pub mod filter;
pub mod index;
pub mod planner;
pub mod schema;
pub mod token;
