//! Secondary index catalog for keyplan
//!
//! The planner consumes candidate indexes defined on a table: each exposes
//! its indexed column, whether it is locally-co-located or globally
//! distributed, and a queryability capability (operator -> supported).
//!
//! # Design Principles
//!
//! - The catalog enumerates candidates; index storage belongs elsewhere
//! - Queryability is a capability interface, not type-based branching
//! - Selection over the catalog is deterministic for identical input

mod catalog;

pub use catalog::{
    CollectionIndex, EqualityIndex, IndexCatalog, IndexDef, IndexKind, IndexQueryability,
    OrderedIndex, PatternIndex,
};
