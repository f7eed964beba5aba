//! The classified restriction set
//!
//! Built once per prepared statement from the schema, the statement kind, the
//! where-clause conjunction, and the index catalog; immutable thereafter.
//! Index-table preparation produces a separate [`super::IndexQueryRestrictions`]
//! stage, so index-table range methods cannot be called on an unprepared
//! value.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::expr::{Atom, Operator, Rhs, Term};
use crate::index::IndexDef;
use crate::schema::TableSchema;

use super::prefix::{ColumnRestriction, PrefixElement, Shape};

/// The kind of statement being prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Read query
    Select,
    /// Row update
    Update,
    /// Row or range deletion
    Delete,
}

impl StatementKind {
    /// Returns true for select statements (the only kind that may use
    /// secondary indexes or filtering on regular columns)
    pub fn is_select(&self) -> bool {
        matches!(self, StatementKind::Select)
    }
}

/// Classification inputs beyond schema, kind, and predicates
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyOptions {
    /// Caller permission to answer otherwise-rejected queries by filtering
    pub allow_filtering: bool,
    /// The statement defines a view; admits IS NOT NULL and degrades shape
    /// violations like filtering does
    pub for_view: bool,
    /// The projection reads only static columns
    pub selects_only_static_columns: bool,
}

/// Restrictions on the partition key: either per-column conjunctions or a
/// token comparison over the whole key, never both
#[derive(Debug, Clone)]
pub struct PartitionRestrictions {
    /// Per-column restrictions, indexed by partition-key position
    pub(crate) by_column: Vec<Option<ColumnRestriction>>,
    /// Token restriction over the full partition key
    pub(crate) token: Option<TokenRestriction>,
}

impl PartitionRestrictions {
    /// Returns true when nothing restricts the partition key
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.by_column.iter().all(Option::is_none)
    }

    /// Number of restricted partition columns
    pub fn restricted_count(&self) -> usize {
        self.by_column.iter().flatten().count()
    }

    /// Iterates the per-column restrictions in key order
    pub fn columns(&self) -> impl Iterator<Item = &ColumnRestriction> {
        self.by_column.iter().flatten()
    }

    /// All partition atoms, token atoms included
    pub fn atoms(&self) -> Vec<&Atom> {
        let mut out: Vec<&Atom> = self.columns().flat_map(|r| r.atoms.iter()).collect();
        if let Some(token) = &self.token {
            out.extend(token.atoms.iter());
        }
        out
    }
}

/// Token comparison atoms over the full partition key
#[derive(Debug, Clone)]
pub struct TokenRestriction {
    /// The token atoms (one equality, or at most one bound per direction)
    pub(crate) atoms: Vec<Atom>,
}

impl TokenRestriction {
    /// Returns the equality term, if present
    pub(crate) fn eq_term(&self) -> Option<&Term> {
        self.atoms.iter().find_map(|a| match (&a.op, &a.rhs) {
            (Operator::Eq, Rhs::Term(t)) => Some(t),
            _ => None,
        })
    }

    /// Returns the lower-bound term and inclusivity, if present
    pub(crate) fn lower(&self) -> Option<(&Term, bool)> {
        self.atoms.iter().find_map(|a| match (&a.op, &a.rhs) {
            (op, Rhs::Term(t)) if op.is_lower_bound() => Some((t, op.is_inclusive())),
            _ => None,
        })
    }

    /// Returns the upper-bound term and inclusivity, if present
    pub(crate) fn upper(&self) -> Option<(&Term, bool)> {
        self.atoms.iter().find_map(|a| match (&a.op, &a.rhs) {
            (op, Rhs::Term(t)) if op.is_upper_bound() => Some((t, op.is_inclusive())),
            _ => None,
        })
    }
}

/// Restrictions on the clustering key: the clean prefix plus whatever could
/// not be folded into it
#[derive(Debug, Clone)]
pub struct ClusteringRestrictions {
    /// Prefix elements, in clustering-key order
    pub(crate) prefix: Vec<PrefixElement>,
    /// Clustering atoms outside the prefix; answerable only by filtering
    pub(crate) residual: Vec<Atom>,
    /// The first prefix-shape violation, if any
    pub(crate) shape_violation: Option<String>,
    /// True when the restrictions use multi-column (tuple) atoms
    pub(crate) has_multi: bool,
}

impl ClusteringRestrictions {
    /// Returns true when nothing restricts the clustering key
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.residual.is_empty()
    }

    /// Returns the prefix elements
    pub fn prefix(&self) -> &[PrefixElement] {
        &self.prefix
    }

    /// Returns the atoms outside the prefix
    pub fn residual(&self) -> &[Atom] {
        &self.residual
    }

    /// True when the restrictions violate the prefix shape
    pub fn violates_prefix_shape(&self) -> bool {
        self.shape_violation.is_some()
    }

    /// The first violation's description, if any
    pub fn shape_violation(&self) -> Option<&str> {
        self.shape_violation.as_deref()
    }

    /// True when the restrictions use multi-column (tuple) atoms
    pub fn has_multi_column(&self) -> bool {
        self.has_multi
    }

    /// All clustering atoms, prefix and residual
    pub fn atoms(&self) -> Vec<&Atom> {
        self.prefix
            .iter()
            .flat_map(|e| e.atoms().iter())
            .chain(self.residual.iter())
            .collect()
    }

    /// Distinct restricted clustering columns
    pub fn restricted_columns(&self) -> BTreeSet<&str> {
        self.atoms()
            .into_iter()
            .flat_map(|a| a.lhs.columns().iter().map(String::as_str))
            .collect()
    }
}

/// The index picked to drive the query, with the restriction that justified
/// the choice
#[derive(Debug, Clone)]
pub struct ChosenIndex {
    /// The selected index
    pub index: IndexDef,
    /// The restriction expression the index serves
    pub restriction: Atom,
}

/// The classified restrictions of one prepared statement.
///
/// Produced by [`QueryRestrictions::classify`]; read-only afterwards. Range
/// computation happens later, once bound variables are known.
#[derive(Debug, Clone)]
pub struct QueryRestrictions {
    pub(crate) schema: Arc<TableSchema>,
    pub(crate) kind: StatementKind,
    pub(crate) allow_filtering: bool,
    pub(crate) for_view: bool,
    pub(crate) partition: PartitionRestrictions,
    pub(crate) clustering: ClusteringRestrictions,
    pub(crate) nonpk: BTreeMap<String, ColumnRestriction>,
    pub(crate) not_null: BTreeSet<String>,
    pub(crate) uses_secondary_indexing: bool,
    pub(crate) is_key_range: bool,
    pub(crate) partition_range_is_simple: bool,
    pub(crate) has_queriable_regular_index: bool,
    pub(crate) has_queriable_pk_index: bool,
    pub(crate) has_queriable_ck_index: bool,
    pub(crate) chosen_index: Option<ChosenIndex>,
}

impl QueryRestrictions {
    /// Returns the table schema this statement was classified against
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Returns the statement kind
    pub fn statement_kind(&self) -> StatementKind {
        self.kind
    }

    /// True when the secondary index needs to be queried
    pub fn uses_secondary_indexing(&self) -> bool {
        self.uses_secondary_indexing
    }

    /// True when the query scans a range of partition keys rather than an
    /// enumerated set
    pub fn is_key_range(&self) -> bool {
        self.is_key_range
    }

    /// False when the partition restrictions imply a cross-product of keys
    pub fn partition_range_is_simple(&self) -> bool {
        self.partition_range_is_simple
    }

    /// True when a token comparison restricts the partition key
    pub fn has_token_restrictions(&self) -> bool {
        self.partition.token.is_some()
    }

    /// True when any partition column carries a set-membership restriction
    pub fn key_is_in_relation(&self) -> bool {
        self.partition
            .columns()
            .any(|r| r.atoms.iter().any(|a| a.op == Operator::In))
    }

    /// True when any clustering restriction is a set membership
    pub fn clustering_key_restrictions_has_in(&self) -> bool {
        self.clustering
            .atoms()
            .iter()
            .any(|a| a.op == Operator::In)
    }

    /// True when the clustering restrictions are empty or all equalities
    pub fn clustering_key_restrictions_has_only_eq(&self) -> bool {
        self.clustering
            .atoms()
            .iter()
            .all(|a| a.op == Operator::Eq)
    }

    /// True when the query restricts the clustering key at all
    pub fn has_clustering_columns_restriction(&self) -> bool {
        !self.clustering.is_empty()
    }

    /// True when the query restricts any regular column
    pub fn has_non_primary_key_restriction(&self) -> bool {
        !self.nonpk.is_empty()
    }

    /// True when nothing restricts the partition key
    pub fn partition_key_restrictions_is_empty(&self) -> bool {
        self.partition.is_empty()
    }

    /// True when every partition restriction is a plain equality
    pub fn partition_key_restrictions_is_all_eq(&self) -> bool {
        self.partition.token.is_none()
            && self
                .partition
                .columns()
                .all(|r| r.atoms.iter().all(|a| a.op == Operator::Eq))
    }

    /// Number of restricted partition columns
    pub fn partition_key_restrictions_size(&self) -> usize {
        self.partition.restricted_count()
    }

    /// True when some partition column has no restriction.
    ///
    /// A token comparison restricts the whole key, so it leaves no
    /// unrestricted components.
    pub fn has_partition_key_unrestricted_components(&self) -> bool {
        self.partition.token.is_none() && self.partition.by_column.iter().any(Option::is_none)
    }

    /// True when some clustering column has no restriction
    pub fn has_unrestricted_clustering_columns(&self) -> bool {
        let restricted = self.clustering.restricted_columns();
        self.schema
            .clustering_key()
            .iter()
            .any(|c| !restricted.contains(c.name.as_str()))
    }

    /// True when the column is restricted by anything, IS NOT NULL included
    pub fn is_restricted(&self, column: &str) -> bool {
        if self.not_null.contains(column) {
            return true;
        }
        if let Some(pos) = self.schema.partition_position(column) {
            return self.partition.by_column[pos].is_some();
        }
        if self.schema.clustering_position(column).is_some() {
            return self
                .clustering
                .atoms()
                .iter()
                .any(|a| a.references(column));
        }
        self.nonpk.contains_key(column)
    }

    /// True when the column carries an equality restriction, either
    /// single-column or as part of a tuple equality. Set membership does not
    /// count.
    pub fn has_eq_restriction_on_column(&self, column: &str) -> bool {
        let eq_on = |atoms: &[&Atom]| {
            atoms
                .iter()
                .any(|a| a.op == Operator::Eq && a.references(column))
        };
        eq_on(&self.partition.atoms())
            || eq_on(&self.clustering.atoms())
            || self
                .nonpk
                .get(column)
                .map(|r| r.atoms.iter().any(|a| a.op == Operator::Eq))
                .unwrap_or(false)
    }

    /// Returns the partition-key restrictions
    pub fn partition_key_restrictions(&self) -> &PartitionRestrictions {
        &self.partition
    }

    /// Returns the clustering-key restrictions
    pub fn clustering_key_restrictions(&self) -> &ClusteringRestrictions {
        &self.clustering
    }

    /// Returns the regular-column restrictions, keyed by column
    pub fn non_primary_key_restrictions(&self) -> &BTreeMap<String, ColumnRestriction> {
        &self.nonpk
    }

    /// Returns the columns carrying an IS NOT NULL requirement
    pub fn not_null_columns(&self) -> &BTreeSet<String> {
        &self.not_null
    }

    /// Returns the chosen index and its justifying restriction, if any
    pub fn chosen_index(&self) -> Option<&ChosenIndex> {
        self.chosen_index.as_ref()
    }

    /// True when the caller allowed filtering for this statement
    pub fn filtering_allowed(&self) -> bool {
        self.allow_filtering
    }

    /// True when the statement defines a view
    pub fn is_for_view(&self) -> bool {
        self.for_view
    }

    /// True when some candidate index can serve a regular-column restriction
    pub fn has_queriable_regular_index(&self) -> bool {
        self.has_queriable_regular_index
    }

    /// True when some candidate index can serve a partition-column
    /// restriction
    pub fn has_queriable_pk_index(&self) -> bool {
        self.has_queriable_pk_index
    }

    /// True when some candidate index can serve a clustering-column
    /// restriction
    pub fn has_queriable_ck_index(&self) -> bool {
        self.has_queriable_ck_index
    }

    /// The atoms eligible for index selection: every regular-column atom,
    /// plus partition atoms when the partition key is not cleanly
    /// key-served, plus clustering atoms when the prefix is violated or has
    /// no partition anchor.
    pub fn index_restrictions(&self) -> Vec<&Atom> {
        let mut out = Vec::new();
        let pk_eligible = self.partition.token.is_none()
            && self.partition.restricted_count() > 0
            && self.is_key_range;
        if pk_eligible {
            out.extend(self.partition.columns().flat_map(|r| r.atoms.iter()));
        }
        let ck_eligible = !self.clustering.is_empty()
            && (self.clustering.violates_prefix_shape()
                || self.has_partition_key_unrestricted_components());
        if ck_eligible {
            out.extend(self.clustering.atoms());
        }
        out.extend(self.nonpk.values().flat_map(|r| r.atoms.iter()));
        out
    }

    /// True when the partition key is fully pinned by single equalities and
    /// set memberships, with no shape irregularity
    pub(crate) fn partition_fully_exact(&self) -> bool {
        self.partition.token.is_none()
            && self.partition.restricted_count() == self.schema.partition_key().len()
            && self.partition.columns().all(|r| r.shape() == Shape::Exact)
    }
}
