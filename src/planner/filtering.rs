//! Filtering necessity
//!
//! Derives the booleans that drive execution: whether the partition or
//! clustering restrictions require post-scan filtering, whether the overall
//! query does, and which columns the filtering phase must re-check.

use crate::schema::ColumnDef;

use super::errors::{RestrictionError, RestrictionResult};
use super::prefix::{ColumnRestriction, Shape};
use super::restrictions::{ChosenIndex, QueryRestrictions};

/// True when the index fully serves the column's conjunction
fn index_covers(chosen: &ChosenIndex, restriction: &ColumnRestriction) -> bool {
    chosen.index.target() == restriction.column
        && restriction
            .atoms
            .iter()
            .all(|a| chosen.index.supports(a.op))
}

impl QueryRestrictions {
    /// True when the partition key is restricted by anything other than a
    /// clean, schema-order-complete equality/membership/token restriction
    pub fn pk_restrictions_need_filtering(&self) -> bool {
        if self.partition.is_empty() {
            return false;
        }
        if self.partition.token.is_some() {
            // mixing token and column restrictions is rejected at
            // classification, so a token restriction stands alone
            return false;
        }
        if self.partition.columns().any(|r| r.shape() != Shape::Exact) {
            return true;
        }
        if self.has_partition_key_unrestricted_components() {
            // a gap requires filtering unless the chosen index compensates
            return !self.chosen_on_partition_column();
        }
        false
    }

    /// True when the clustering restrictions cannot run as a clean prefix
    /// scan: a shape violation, no concrete partition to anchor against, or
    /// secondary indexing combined with a token restriction (the partition
    /// set is not fixed, so every non-indexed predicate is re-checked)
    pub fn ck_restrictions_need_filtering(&self) -> bool {
        if self.clustering.is_empty() {
            return false;
        }
        if self.clustering.violates_prefix_shape() {
            return true;
        }
        if self.uses_secondary_indexing && self.has_token_restrictions() {
            return true;
        }
        if self.has_partition_key_unrestricted_components() {
            // a clustering restriction fully served by the chosen index
            // needs no partition anchor
            return !self.ck_fully_served_by_index();
        }
        false
    }

    /// True when every clustering atom is on the chosen index's column and
    /// supported by it
    fn ck_fully_served_by_index(&self) -> bool {
        let Some(chosen) = &self.chosen_index else {
            return false;
        };
        self.clustering.atoms().iter().all(|a| {
            a.single_column() == Some(chosen.index.target()) && chosen.index.supports(a.op)
        })
    }

    /// True when the query needs row-by-row filtering on top of its scan
    pub fn need_filtering(&self) -> bool {
        if self.pk_restrictions_need_filtering() || self.ck_restrictions_need_filtering() {
            return true;
        }
        match &self.chosen_index {
            None => !self.nonpk.is_empty(),
            Some(chosen) => {
                if self.nonpk.values().any(|r| !index_covers(chosen, r)) {
                    return true;
                }
                // an index-compensated partition gap still leaves the other
                // restricted partition columns unchecked
                if self.has_partition_key_unrestricted_components()
                    && self
                        .partition
                        .columns()
                        .any(|r| r.column != chosen.index.target())
                {
                    return true;
                }
                false
            }
        }
    }

    /// Rejects index selections that conflict with a static-only projection:
    /// no clustering row is materialized, so an index over a non-static
    /// column has nothing to evaluate against
    pub fn validate_secondary_index_selections(
        &self,
        selects_only_static_columns: bool,
    ) -> RestrictionResult<()> {
        if !selects_only_static_columns || !self.uses_secondary_indexing {
            return Ok(());
        }
        let static_target = self
            .chosen_index
            .as_ref()
            .map(|c| self.schema.is_static(c.index.target()))
            .unwrap_or(false);
        if static_target {
            Ok(())
        } else {
            Err(RestrictionError::StaticProjectionWithIndex)
        }
    }

    /// The column definitions the filtering phase must re-check, in schema
    /// order per bucket. Columns fully served by the chosen index are
    /// excluded.
    pub fn get_column_defs_for_filtering(&self) -> Vec<&ColumnDef> {
        fn push<'a>(out: &mut Vec<&'a ColumnDef>, def: Option<&'a ColumnDef>) {
            if let Some(def) = def {
                if !out.iter().any(|d| d.name == def.name) {
                    out.push(def);
                }
            }
        }

        let mut out: Vec<&ColumnDef> = Vec::new();
        if self.pk_restrictions_need_filtering() {
            for restriction in self.partition.columns() {
                if self.covered_by_chosen(restriction) {
                    continue;
                }
                push(&mut out, self.schema.column(&restriction.column));
            }
        }
        if self.ck_restrictions_need_filtering() {
            let restricted = self.clustering.restricted_columns();
            for def in self.schema.clustering_key() {
                if restricted.contains(def.name.as_str()) {
                    push(&mut out, Some(def));
                }
            }
        }
        for restriction in self.nonpk.values() {
            if self.covered_by_chosen(restriction) {
                continue;
            }
            push(&mut out, self.schema.column(&restriction.column));
        }
        out
    }

    fn covered_by_chosen(&self, restriction: &ColumnRestriction) -> bool {
        self.chosen_index
            .as_ref()
            .map(|chosen| index_covers(chosen, restriction))
            .unwrap_or(false)
    }

    fn chosen_on_partition_column(&self) -> bool {
        self.chosen_index
            .as_ref()
            .map(|c| self.schema.partition_position(c.index.target()).is_some())
            .unwrap_or(false)
    }
}
