//! Index descriptors and the candidate catalog

use std::fmt;
use std::sync::Arc;

use crate::expr::Operator;

/// Placement of a secondary index relative to the base table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Co-located with base data per partition; useful only once the
    /// partition is known
    Local,
    /// Distributed independently of the base table
    Global,
}

impl IndexKind {
    /// Returns the kind name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Local => "local",
            IndexKind::Global => "global",
        }
    }
}

/// Operator support of an index implementation.
///
/// Implemented per index kind; the selector asks `supports` instead of
/// branching on index types.
pub trait IndexQueryability: Send + Sync {
    /// Returns true when the index can serve the given operator
    fn supports(&self, op: Operator) -> bool;
}

/// Serves equality and set-membership lookups only
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityIndex;

impl IndexQueryability for EqualityIndex {
    fn supports(&self, op: Operator) -> bool {
        matches!(op, Operator::Eq | Operator::In)
    }
}

/// Serves equality, set-membership, and ordered-range lookups
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedIndex;

impl IndexQueryability for OrderedIndex {
    fn supports(&self, op: Operator) -> bool {
        matches!(
            op,
            Operator::Eq | Operator::In | Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
        )
    }
}

/// Serves collection containment lookups
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionIndex;

impl IndexQueryability for CollectionIndex {
    fn supports(&self, op: Operator) -> bool {
        matches!(op, Operator::Contains | Operator::ContainsKey)
    }
}

/// Serves equality and text wildcard lookups
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternIndex;

impl IndexQueryability for PatternIndex {
    fn supports(&self, op: Operator) -> bool {
        matches!(op, Operator::Eq | Operator::Like)
    }
}

/// A candidate secondary index on one column of the base table
#[derive(Clone)]
pub struct IndexDef {
    name: String,
    target: String,
    kind: IndexKind,
    queryability: Arc<dyn IndexQueryability>,
}

impl IndexDef {
    /// Creates an index descriptor
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        kind: IndexKind,
        queryability: impl IndexQueryability + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            queryability: Arc::new(queryability),
        }
    }

    /// Returns the index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the indexed base-table column
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the index placement
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Returns true for locally-co-located indexes
    pub fn is_local(&self) -> bool {
        self.kind == IndexKind::Local
    }

    /// Returns true when the index can serve the given operator
    pub fn supports(&self, op: Operator) -> bool {
        self.queryability.supports(op)
    }
}

impl fmt::Debug for IndexDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDef")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PartialEq for IndexDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.target == other.target && self.kind == other.kind
    }
}

impl Eq for IndexDef {}

/// The set of candidate indexes defined on one table
#[derive(Debug, Clone, Default)]
pub struct IndexCatalog {
    indexes: Vec<IndexDef>,
}

impl IndexCatalog {
    /// Creates an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an index to the catalog
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Returns the candidate indexes
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Returns true when no indexes are defined
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Returns the indexes targeting the named column
    pub fn indexes_on<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a IndexDef> + 'a {
        self.indexes.iter().filter(move |i| i.target() == column)
    }
}
