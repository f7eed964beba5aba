//! Table schema model for keyplan
//!
//! The schema is a read-only input to classification: ordered partition-key
//! columns, ordered clustering-key columns, and regular columns, each with a
//! native type.
//!
//! # Design Principles
//!
//! - Immutable for the lifetime of a classified statement
//! - Column kind is an explicit three-way sum, handled exhaustively
//! - No persistence; the catalog layer owns schema storage

mod types;

pub use types::{ColumnDef, ColumnKind, NativeType, TableSchema};
