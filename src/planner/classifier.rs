//! Restriction classification
//!
//! Routes each where-clause atom into the partition-key, clustering-key, or
//! regular-column bucket, validates the structural invariants, and decides
//! whether the query degrades to secondary indexing or filtering. Runs once
//! at preparation time.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::expr::{Atom, Lhs, Operator, Rhs};
use crate::index::IndexCatalog;
use crate::schema::{ColumnDef, ColumnKind, TableSchema};

use super::errors::{RestrictionError, RestrictionResult};
use super::prefix::{ColumnRestriction, PrefixElement, Shape};
use super::restrictions::{
    ClassifyOptions, ClusteringRestrictions, PartitionRestrictions, QueryRestrictions,
    StatementKind, TokenRestriction,
};

impl QueryRestrictions {
    /// Classifies a where-clause conjunction against a table schema.
    ///
    /// This is the only constructor. It populates the three buckets, decides
    /// `is_key_range` / `uses_secondary_indexing`, runs index selection, and
    /// rejects invalid requests. The result is immutable.
    pub fn classify(
        schema: Arc<TableSchema>,
        kind: StatementKind,
        where_clause: Vec<Atom>,
        catalog: &IndexCatalog,
        options: ClassifyOptions,
    ) -> RestrictionResult<Self> {
        let partition_len = schema.partition_key().len();
        let mut builder = Classifier {
            schema,
            kind,
            options,
            partition_by_column: vec![None; partition_len],
            token_atoms: Vec::new(),
            ck_by_position: BTreeMap::new(),
            ck_multi: Vec::new(),
            nonpk: BTreeMap::new(),
            not_null: BTreeSet::new(),
        };

        for atom in &where_clause {
            builder.route(atom)?;
        }
        builder.check_not_null_conflicts()?;
        builder.finish(catalog)
    }
}

/// Working state while routing atoms into buckets
struct Classifier {
    schema: Arc<TableSchema>,
    kind: StatementKind,
    options: ClassifyOptions,
    partition_by_column: Vec<Option<ColumnRestriction>>,
    token_atoms: Vec<Atom>,
    ck_by_position: BTreeMap<usize, ColumnRestriction>,
    ck_multi: Vec<Atom>,
    nonpk: BTreeMap<String, ColumnRestriction>,
    not_null: BTreeSet<String>,
}

impl Classifier {
    fn route(&mut self, atom: &Atom) -> RestrictionResult<()> {
        match &atom.lhs {
            Lhs::Token(columns) => self.route_token(atom, columns),
            Lhs::Column(name) => self.route_single(atom, name),
            Lhs::Tuple(columns) => self.route_tuple(atom, columns),
        }
    }

    fn route_token(&mut self, atom: &Atom, columns: &[String]) -> RestrictionResult<()> {
        let pk = self.schema.partition_key();
        let matches_pk = columns.len() == pk.len()
            && columns.iter().zip(pk.iter()).all(|(c, def)| *c == def.name);
        if !matches_pk {
            return Err(RestrictionError::TokenColumnsMismatch);
        }
        if !(atom.op == Operator::Eq || atom.op.is_slice()) {
            return Err(RestrictionError::InvalidTokenRestriction {
                reason: format!("operator {} is not supported on token", atom.op),
            });
        }
        self.token_atoms.push(atom.clone());
        Ok(())
    }

    fn route_single(&mut self, atom: &Atom, name: &str) -> RestrictionResult<()> {
        let def = self
            .schema
            .column(name)
            .ok_or_else(|| RestrictionError::UnknownColumn {
                column: name.to_string(),
            })?;
        let kind = self.schema.column_kind(name).unwrap_or(ColumnKind::Regular);

        if atom.op == Operator::IsNotNull {
            if !self.options.for_view {
                return Err(RestrictionError::NotNullUnsupported {
                    column: name.to_string(),
                });
            }
            // the base partition key can never be null, so requiring it is
            // meaningless
            if kind == ColumnKind::PartitionKey {
                return Err(RestrictionError::NotNullRedundant {
                    column: name.to_string(),
                });
            }
            self.not_null.insert(name.to_string());
            return Ok(());
        }

        validate_operator_for_type(def, atom.op)?;

        match kind {
            ColumnKind::PartitionKey => {
                let pos = self.schema.partition_position(name).unwrap_or_default();
                self.partition_by_column[pos]
                    .get_or_insert_with(|| ColumnRestriction::new(name))
                    .push(atom.clone());
            }
            ColumnKind::ClusteringKey => {
                let pos = self.schema.clustering_position(name).unwrap_or_default();
                self.ck_by_position
                    .entry(pos)
                    .or_insert_with(|| ColumnRestriction::new(name))
                    .push(atom.clone());
            }
            ColumnKind::Regular => {
                self.nonpk
                    .entry(name.to_string())
                    .or_insert_with(|| ColumnRestriction::new(name))
                    .push(atom.clone());
            }
        }
        Ok(())
    }

    fn route_tuple(&mut self, atom: &Atom, columns: &[String]) -> RestrictionResult<()> {
        let mut kinds = Vec::with_capacity(columns.len());
        for name in columns {
            let kind =
                self.schema
                    .column_kind(name)
                    .ok_or_else(|| RestrictionError::UnknownColumn {
                        column: name.clone(),
                    })?;
            kinds.push(kind);
        }
        let rendered = columns.join(", ");

        if kinds.iter().all(|k| *k == ColumnKind::ClusteringKey) {
            let positions: Vec<usize> = columns
                .iter()
                .map(|c| self.schema.clustering_position(c).unwrap_or_default())
                .collect();
            if !positions.windows(2).all(|w| w[1] == w[0] + 1) {
                return Err(RestrictionError::TupleOrder { columns: rendered });
            }
            self.validate_tuple_arity(atom, columns.len())?;
            self.ck_multi.push(atom.clone());
            Ok(())
        } else if kinds.iter().all(|k| *k == ColumnKind::PartitionKey) {
            // a partition tuple equality is shorthand for per-column
            // equalities
            let terms = match (&atom.op, &atom.rhs) {
                (Operator::Eq, Rhs::Tuple(terms)) if terms.len() == columns.len() => terms,
                _ => return Err(RestrictionError::PartitionTupleUnsupported),
            };
            for (name, term) in columns.iter().zip(terms.iter()) {
                let pos = self.schema.partition_position(name).unwrap_or_default();
                self.partition_by_column[pos]
                    .get_or_insert_with(|| ColumnRestriction::new(name.clone()))
                    .push(Atom {
                        lhs: Lhs::Column(name.clone()),
                        op: Operator::Eq,
                        rhs: Rhs::Term(term.clone()),
                    });
            }
            Ok(())
        } else {
            Err(RestrictionError::MixedTuple { columns: rendered })
        }
    }

    fn validate_tuple_arity(&self, atom: &Atom, width: usize) -> RestrictionResult<()> {
        let rendered = || atom.lhs.columns().join(", ");
        match (&atom.op, &atom.rhs) {
            (Operator::Eq, Rhs::Tuple(terms)) if terms.len() == width => Ok(()),
            (op, Rhs::Tuple(terms)) if op.is_slice() && terms.len() <= width => Ok(()),
            (Operator::In, Rhs::TupleList(tuples))
                if tuples.iter().all(|t| t.len() == width) =>
            {
                Ok(())
            }
            _ => Err(RestrictionError::TupleOrder {
                columns: rendered(),
            }),
        }
    }

    fn check_not_null_conflicts(&self) -> RestrictionResult<()> {
        for column in &self.not_null {
            let restricted_elsewhere = self
                .partition_by_column
                .iter()
                .flatten()
                .any(|r| r.column == *column)
                || self.ck_by_position.values().any(|r| r.column == *column)
                || self.ck_multi.iter().any(|a| a.references(column))
                || self.nonpk.contains_key(column);
            if restricted_elsewhere {
                return Err(RestrictionError::NotNullConflict {
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    fn finish(self, catalog: &IndexCatalog) -> RestrictionResult<QueryRestrictions> {
        let Classifier {
            schema,
            kind,
            options,
            partition_by_column,
            token_atoms,
            ck_by_position,
            ck_multi,
            nonpk,
            not_null,
        } = self;

        let token = if token_atoms.is_empty() {
            None
        } else {
            Some(validate_token_atoms(token_atoms)?)
        };
        let partition = PartitionRestrictions {
            by_column: partition_by_column,
            token,
        };

        // candidate-index capability per bucket; only selects can use them
        let supports = |r: &ColumnRestriction| {
            catalog
                .indexes_on(&r.column)
                .any(|idx| r.atoms.iter().any(|a| idx.supports(a.op)))
        };
        let select = kind.is_select();
        let has_queriable_regular_index = select && nonpk.values().any(&supports);
        let has_queriable_pk_index = select && partition.columns().any(&supports);
        let has_queriable_ck_index = select && ck_by_position.values().any(&supports);

        let degrade_allowed = options.allow_filtering || options.for_view;
        let mut uses_secondary_indexing = false;

        // partition-key processing
        let pk_len = schema.partition_key().len();
        let (is_key_range, partition_range_is_simple) = if partition.token.is_some() {
            if partition.restricted_count() > 0 {
                return Err(RestrictionError::TokenWithColumnRestrictions);
            }
            (true, true)
        } else {
            let restricted = partition.restricted_count();
            let all_exact = partition.columns().all(|r| r.shape() == Shape::Exact);
            if restricted == 0 {
                (true, true)
            } else if restricted == pk_len && all_exact {
                let any_in = partition.columns().any(|r| r.has_in());
                (false, !any_in)
            } else {
                if has_queriable_pk_index {
                    uses_secondary_indexing = true;
                } else if !degrade_allowed {
                    if restricted < pk_len {
                        let missing = schema
                            .partition_key()
                            .iter()
                            .zip(partition.by_column.iter())
                            .find(|(_, r)| r.is_none())
                            .map(|(def, _)| def.name.clone())
                            .unwrap_or_default();
                        return Err(RestrictionError::PartitionPartial { column: missing });
                    }
                    let irregular = partition
                        .columns()
                        .find(|r| r.shape() != Shape::Exact)
                        .map(|r| r.column.clone())
                        .unwrap_or_default();
                    return Err(RestrictionError::PartitionNonExact { column: irregular });
                }
                (true, false)
            }
        };

        // clustering-key processing
        let clustering = build_clustering(&schema, ck_by_position, ck_multi);
        if let Some(reason) = &clustering.shape_violation {
            if has_queriable_ck_index {
                uses_secondary_indexing = true;
            } else if !degrade_allowed {
                return Err(RestrictionError::ClusteringShape {
                    reason: reason.clone(),
                });
            }
        }
        let pk_has_unrestricted =
            partition.token.is_none() && partition.by_column.iter().any(Option::is_none);
        if !clustering.is_empty() && pk_has_unrestricted {
            // no concrete partition to anchor the prefix against
            if has_queriable_ck_index {
                uses_secondary_indexing = true;
            } else if !degrade_allowed && !uses_secondary_indexing {
                return Err(RestrictionError::FilteringRequired);
            }
        }

        // regular-column processing
        if !nonpk.is_empty() {
            if !select {
                return Err(RestrictionError::NonSelectRegularRestriction);
            }
            if has_queriable_regular_index {
                uses_secondary_indexing = true;
            } else if !degrade_allowed {
                return Err(RestrictionError::FilteringRequired);
            }
        }

        let mut restrictions = QueryRestrictions {
            schema,
            kind,
            allow_filtering: options.allow_filtering,
            for_view: options.for_view,
            partition,
            clustering,
            nonpk,
            not_null,
            uses_secondary_indexing,
            is_key_range,
            partition_range_is_simple,
            has_queriable_regular_index,
            has_queriable_pk_index,
            has_queriable_ck_index,
            chosen_index: None,
        };

        if restrictions.uses_secondary_indexing {
            restrictions.chosen_index = restrictions.find_idx(catalog);
            if restrictions.chosen_index.is_none() {
                // capability flags said an index exists; losing it here means
                // the restriction set and catalog disagree
                if degrade_allowed {
                    restrictions.uses_secondary_indexing = false;
                } else {
                    return Err(RestrictionError::FilteringRequired);
                }
            }
        }

        restrictions.validate_secondary_index_selections(options.selects_only_static_columns)?;

        // whatever the scan and index leave unchecked is filtered; without
        // permission that is a rejection, not a silent degradation
        if restrictions.need_filtering() && !degrade_allowed {
            return Err(RestrictionError::FilteringRequired);
        }

        debug!(
            table = restrictions.schema.name(),
            key_range = restrictions.is_key_range,
            uses_index = restrictions.uses_secondary_indexing,
            needs_filtering = restrictions.need_filtering(),
            "classified statement restrictions"
        );
        Ok(restrictions)
    }
}

/// Rejects operators a column's type cannot support
fn validate_operator_for_type(def: &ColumnDef, op: Operator) -> RestrictionResult<()> {
    let unsupported = || RestrictionError::UnsupportedOperator {
        column: def.name.clone(),
        op: op.as_str().to_string(),
        type_name: def.column_type.type_name().to_string(),
    };
    match op {
        Operator::Contains => {
            if !def.column_type.is_collection() {
                return Err(unsupported());
            }
        }
        Operator::ContainsKey => {
            if !def.column_type.is_map() {
                return Err(unsupported());
            }
        }
        Operator::Like => {
            if !def.column_type.is_text() {
                return Err(unsupported());
            }
        }
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            if def.column_type.is_collection() {
                return Err(unsupported());
            }
        }
        Operator::Eq | Operator::In | Operator::IsNotNull => {}
    }
    Ok(())
}

/// Validates the token conjunction: one equality, or at most one bound per
/// direction
fn validate_token_atoms(atoms: Vec<Atom>) -> RestrictionResult<TokenRestriction> {
    let eq = atoms.iter().filter(|a| a.op == Operator::Eq).count();
    let lower = atoms.iter().filter(|a| a.op.is_lower_bound()).count();
    let upper = atoms.iter().filter(|a| a.op.is_upper_bound()).count();
    let invalid = |reason: &str| RestrictionError::InvalidTokenRestriction {
        reason: reason.to_string(),
    };
    if eq > 1 {
        return Err(invalid("more than one token equality"));
    }
    if eq == 1 && lower + upper > 0 {
        return Err(invalid("token equality combined with a token bound"));
    }
    if lower > 1 || upper > 1 {
        return Err(invalid("more than one token bound per direction"));
    }
    Ok(TokenRestriction { atoms })
}

/// Builds the clustering prefix, classifying everything that does not fit
/// the prefix shape as residual
fn build_clustering(
    schema: &TableSchema,
    mut by_position: BTreeMap<usize, ColumnRestriction>,
    multi: Vec<Atom>,
) -> ClusteringRestrictions {
    let has_multi = !multi.is_empty();
    let mut clustering = ClusteringRestrictions {
        prefix: Vec::new(),
        residual: Vec::new(),
        shape_violation: None,
        has_multi,
    };

    if !by_position.is_empty() && has_multi {
        clustering.shape_violation =
            Some("cannot mix single-column and multi-column clustering restrictions".to_string());
        clustering
            .residual
            .extend(by_position.into_values().flat_map(|r| r.atoms));
        clustering.residual.extend(multi);
        return clustering;
    }

    if has_multi {
        build_multi_prefix(schema, multi, &mut clustering);
        return clustering;
    }

    let mut violation: Option<String> = None;
    let mut slice_seen = false;
    for position in 0..schema.clustering_key().len() {
        match by_position.remove(&position) {
            Some(restriction) => {
                if violation.is_some() {
                    clustering.residual.extend(restriction.atoms);
                    continue;
                }
                if slice_seen {
                    violation = Some(format!(
                        "clustering column '{}' is restricted after a bounded range",
                        restriction.column
                    ));
                    clustering.residual.extend(restriction.atoms);
                    continue;
                }
                match restriction.shape() {
                    Shape::Exact => clustering.prefix.push(PrefixElement::Single(restriction)),
                    Shape::Slice => {
                        slice_seen = true;
                        clustering.prefix.push(PrefixElement::Single(restriction));
                    }
                    Shape::Irregular => {
                        violation = Some(format!(
                            "unsupported restriction conjunction on clustering column '{}'",
                            restriction.column
                        ));
                        clustering.residual.extend(restriction.atoms);
                    }
                }
            }
            None => {
                if !by_position.is_empty() && violation.is_none() {
                    let skipped = &schema.clustering_key()[position].name;
                    let next = by_position
                        .values()
                        .next()
                        .map(|r| r.column.clone())
                        .unwrap_or_default();
                    violation = Some(format!(
                        "clustering column '{}' cannot be restricted because preceding column '{}' is not restricted",
                        next, skipped
                    ));
                }
                break;
            }
        }
    }
    // anything still unprocessed sits after a gap
    clustering
        .residual
        .extend(by_position.into_values().flat_map(|r| r.atoms));
    clustering.shape_violation = violation;
    clustering
}

/// Builds the prefix for the multi-column (tuple) case: exact tuples chain
/// gaplessly from the first clustering column; at most one trailing slice
/// group with one bound per direction
fn build_multi_prefix(schema: &TableSchema, multi: Vec<Atom>, out: &mut ClusteringRestrictions) {
    let mut violation: Option<String> = None;
    let mut next_position = 0usize;
    let mut slice_atoms: Vec<Atom> = Vec::new();
    let mut slice_start: Option<usize> = None;

    for atom in multi {
        let columns = atom.lhs.columns().to_vec();
        let start = schema
            .clustering_position(&columns[0])
            .unwrap_or_default();
        if violation.is_some() {
            out.residual.push(atom);
            continue;
        }
        match atom.op {
            Operator::Eq | Operator::In => {
                if !slice_atoms.is_empty() || start != next_position {
                    violation = Some(format!(
                        "tuple restriction on ({}) does not continue the clustering prefix",
                        columns.join(", ")
                    ));
                    out.residual.push(atom);
                    continue;
                }
                next_position += columns.len();
                out.prefix.push(PrefixElement::Multi {
                    columns,
                    atoms: vec![atom],
                });
            }
            op if op.is_slice() => {
                if start != next_position || slice_start.is_some_and(|s| s != start) {
                    violation = Some(format!(
                        "tuple bound on ({}) does not continue the clustering prefix",
                        columns.join(", ")
                    ));
                    out.residual.push(atom);
                    continue;
                }
                let same_direction = slice_atoms.iter().any(|a| {
                    (a.op.is_lower_bound() && op.is_lower_bound())
                        || (a.op.is_upper_bound() && op.is_upper_bound())
                });
                if same_direction {
                    violation = Some(format!(
                        "more than one tuple bound per direction on ({})",
                        columns.join(", ")
                    ));
                    out.residual.push(atom);
                    continue;
                }
                slice_start = Some(start);
                slice_atoms.push(atom);
            }
            _ => {
                violation = Some(format!(
                    "operator {} is not supported on tuple restrictions",
                    atom.op
                ));
                out.residual.push(atom);
            }
        }
    }

    if !slice_atoms.is_empty() {
        let columns = slice_atoms
            .iter()
            .map(|a| a.lhs.columns())
            .max_by_key(|cols| cols.len())
            .map(|cols| cols.to_vec())
            .unwrap_or_default();
        out.prefix.push(PrefixElement::Multi {
            columns,
            atoms: slice_atoms,
        });
    }
    out.shape_violation = violation;
}
