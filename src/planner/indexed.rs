//! Index-table preparation and range computation
//!
//! Querying a secondary index means querying the index's own storage table,
//! whose clustering key is `(token, partition-key…, clustering-key…)` of the
//! base table for a global index and `(indexed-column, clustering-key…)` for
//! a local one. Preparation re-expresses the base-table prefix in terms of
//! that layout; the result is a distinct type, so index-table range methods
//! cannot be called before preparation.

use std::fmt;
use std::sync::Arc;

use crate::expr::{Bindings, Value};
use crate::schema::TableSchema;
use crate::token::Token;

use super::combinations::Combinations;
use super::errors::{RestrictionError, RestrictionResult};
use super::prefix::{PrefixElement, Shape};
use super::ranges::{assemble_ranges, resolve_elements, ClusteringRange, RangeBound};
use super::restrictions::QueryRestrictions;

/// Which index-table layout the statement was prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTableMode {
    /// Co-located per partition: `(indexed-column, clustering-key…)`
    Local,
    /// Independently distributed: `(token, partition-key…, clustering-key…)`
    Global,
}

/// One element of the index-table clustering prefix
#[derive(Debug, Clone)]
pub enum IdxPrefixElement {
    /// The leading token component of a global index table. Its value is
    /// unknown until partition keys are enumerated at range computation.
    TokenPlaceholder {
        /// Index-table column holding the token
        column: String,
    },
    /// A base-table restriction relabelled onto index-table column(s)
    Element(PrefixElement),
}

impl fmt::Display for IdxPrefixElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdxPrefixElement::TokenPlaceholder { column } => write!(f, "{} = <token>", column),
            IdxPrefixElement::Element(element) => write!(f, "{}", element),
        }
    }
}

/// A classified statement prepared for querying one index table.
///
/// Produced by [`QueryRestrictions::prepare_indexed_local`] or
/// [`QueryRestrictions::prepare_indexed_global`]; the base classification
/// stays reachable through [`IndexQueryRestrictions::base`].
#[derive(Debug, Clone)]
pub struct IndexQueryRestrictions {
    base: QueryRestrictions,
    idx_schema: Arc<TableSchema>,
    mode: IndexTableMode,
    prefix: Vec<IdxPrefixElement>,
    scan_elements: Vec<PrefixElement>,
}

impl QueryRestrictions {
    /// Prepares this statement for querying a local index table, whose
    /// clustering key is the indexed column followed by the base clustering
    /// key.
    pub fn prepare_indexed_local(
        self,
        idx_schema: Arc<TableSchema>,
    ) -> RestrictionResult<IndexQueryRestrictions> {
        let chosen = self
            .chosen_index
            .as_ref()
            .ok_or_else(|| RestrictionError::IndexPreparation {
                reason: "no index was selected for this statement".to_string(),
            })?;
        let target = chosen.index.target().to_string();
        let leading = idx_schema
            .clustering_key()
            .first()
            .ok_or_else(|| RestrictionError::IndexPreparation {
                reason: "index table has no clustering key".to_string(),
            })?;
        if leading.name != target {
            return Err(RestrictionError::IndexPreparation {
                reason: format!(
                    "index table clustering key starts with '{}', expected indexed column '{}'",
                    leading.name, target
                ),
            });
        }
        let target_restriction = self
            .nonpk
            .get(&target)
            .cloned()
            .ok_or_else(|| RestrictionError::IndexPreparation {
                reason: format!("no restriction on indexed column '{}'", target),
            })?;

        let mut prefix = vec![IdxPrefixElement::Element(PrefixElement::Single(
            target_restriction.clone(),
        ))];
        let ck_elements = self.relabelled_clustering_elements(&idx_schema)?;
        prefix.extend(ck_elements.iter().cloned().map(IdxPrefixElement::Element));

        // a non-exact leading element ends the scannable prefix; anything
        // after it is re-checked by filtering
        let mut scan_elements = vec![PrefixElement::Single(target_restriction.clone())];
        if target_restriction.shape() == Shape::Exact {
            scan_elements.extend(ck_elements);
        }

        Ok(IndexQueryRestrictions {
            base: self,
            idx_schema,
            mode: IndexTableMode::Local,
            prefix,
            scan_elements,
        })
    }

    /// Prepares this statement for querying a global index table, whose
    /// clustering key is the base-key token, the base partition columns, and
    /// the base clustering columns. The token component is a placeholder
    /// filled per concrete partition key at range computation.
    pub fn prepare_indexed_global(
        self,
        idx_schema: Arc<TableSchema>,
    ) -> RestrictionResult<IndexQueryRestrictions> {
        let token_column = idx_schema
            .clustering_key()
            .first()
            .ok_or_else(|| RestrictionError::IndexPreparation {
                reason: "index table has no clustering key".to_string(),
            })?;
        let mut prefix = vec![IdxPrefixElement::TokenPlaceholder {
            column: token_column.name.clone(),
        }];

        if self.partition.token.is_none() {
            for restriction in self.partition.columns() {
                if idx_schema.clustering_position(&restriction.column).is_none() {
                    return Err(RestrictionError::IndexPreparation {
                        reason: format!(
                            "index table has no clustering column '{}'",
                            restriction.column
                        ),
                    });
                }
                prefix.push(IdxPrefixElement::Element(PrefixElement::Single(
                    restriction.clone(),
                )));
            }
        }

        let scan_elements = self.relabelled_clustering_elements(&idx_schema)?;
        prefix.extend(scan_elements.iter().cloned().map(IdxPrefixElement::Element));

        Ok(IndexQueryRestrictions {
            base: self,
            idx_schema,
            mode: IndexTableMode::Global,
            prefix,
            scan_elements,
        })
    }

    /// Relabels the base-table clustering prefix onto the index table's
    /// columns, preserving element order, operators, and values. The mapping
    /// is by column name; a base column missing from the index-table
    /// clustering key is a preparation error.
    fn relabelled_clustering_elements(
        &self,
        idx_schema: &TableSchema,
    ) -> RestrictionResult<Vec<PrefixElement>> {
        let mut out = Vec::with_capacity(self.clustering.prefix.len());
        for element in &self.clustering.prefix {
            for column in element.columns() {
                if idx_schema.clustering_position(column).is_none() {
                    return Err(RestrictionError::IndexPreparation {
                        reason: format!("index table has no clustering column '{}'", column),
                    });
                }
            }
            out.push(element.clone());
        }
        Ok(out)
    }
}

impl IndexQueryRestrictions {
    /// The underlying base-table classification
    pub fn base(&self) -> &QueryRestrictions {
        &self.base
    }

    /// The index-table schema this statement was prepared against
    pub fn index_schema(&self) -> &TableSchema {
        &self.idx_schema
    }

    /// The prepared layout kind
    pub fn mode(&self) -> IndexTableMode {
        self.mode
    }

    /// The structural index-table prefix, token placeholder included
    pub fn idx_ck_prefix(&self) -> &[IdxPrefixElement] {
        &self.prefix
    }

    /// Clustering ranges for a global index table, one per enumerated base
    /// partition key and clustering combination. The leading token value is
    /// derived per key.
    pub fn get_global_index_clustering_ranges(
        &self,
        bindings: &Bindings,
    ) -> RestrictionResult<Vec<ClusteringRange>> {
        self.ensure_mode(IndexTableMode::Global)?;
        if self.base.has_token_restrictions() {
            return Err(RestrictionError::IndexPreparation {
                reason: "token restrictions present; use the token range variant".to_string(),
            });
        }
        if !self.base.partition_fully_exact() {
            // no complete key to derive tokens from; the scan is keyed by the
            // index alone and the remaining restrictions are filtered
            return Ok(vec![ClusteringRange::full()]);
        }
        let axes = match self.base.partition_axes(bindings)? {
            Some(axes) => axes,
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::new();
        for key_values in Combinations::new(axes) {
            let token = Token::for_key(&key_values);
            let lead: Vec<Value> = std::iter::once(Value::Int(token.0))
                .chain(key_values)
                .collect();
            let resolved = resolve_elements(&self.scan_elements, bindings)?;
            out.extend(assemble_ranges(&lead, resolved));
        }
        out.sort_by(|a, b| {
            let key = |r: &ClusteringRange| r.start.as_ref().map(|b| b.prefix.clone());
            key(a).cmp(&key(b))
        });
        Ok(out)
    }

    /// Clustering ranges for a global index table when the base query
    /// restricts by token: the leading component is bounded by the token
    /// interval instead of fixed per enumerated key.
    pub fn get_global_index_token_clustering_ranges(
        &self,
        bindings: &Bindings,
    ) -> RestrictionResult<Vec<ClusteringRange>> {
        self.ensure_mode(IndexTableMode::Global)?;
        if !self.base.has_token_restrictions() {
            return Err(RestrictionError::IndexPreparation {
                reason: "no token restrictions present; use the per-key variant".to_string(),
            });
        }
        let range = self.base.resolve_token_range(bindings)?;
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let start = range.start.map(|b| RangeBound {
            prefix: vec![Value::Int(b.token.0)],
            inclusive: b.inclusive,
        });
        let end = range.end.map(|b| RangeBound {
            prefix: vec![Value::Int(b.token.0)],
            inclusive: b.inclusive,
        });
        Ok(vec![ClusteringRange { start, end }])
    }

    /// Clustering ranges for a local index table: the indexed column leads,
    /// followed by the base clustering prefix.
    pub fn get_local_index_clustering_ranges(
        &self,
        bindings: &Bindings,
    ) -> RestrictionResult<Vec<ClusteringRange>> {
        self.ensure_mode(IndexTableMode::Local)?;
        let resolved = resolve_elements(&self.scan_elements, bindings)?;
        Ok(assemble_ranges(&[], resolved))
    }

    fn ensure_mode(&self, expected: IndexTableMode) -> RestrictionResult<()> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(RestrictionError::IndexPreparation {
                reason: format!(
                    "statement was prepared for a {} index table",
                    match self.mode {
                        IndexTableMode::Local => "local",
                        IndexTableMode::Global => "global",
                    }
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::expr::{Atom, Operator};
    use crate::index::{EqualityIndex, IndexCatalog, IndexDef, IndexKind};
    use crate::planner::{ClassifyOptions, StatementKind};
    use crate::schema::NativeType;

    fn base_schema() -> Arc<TableSchema> {
        Arc::new(
            TableSchema::new("events")
                .with_partition_key("a", NativeType::Int)
                .with_clustering_key("b", NativeType::Int)
                .with_clustering_key("c", NativeType::Int)
                .with_column("d", NativeType::Text),
        )
    }

    fn global_idx_schema() -> Arc<TableSchema> {
        Arc::new(
            TableSchema::new("d_index")
                .with_partition_key("d", NativeType::Text)
                .with_clustering_key("idx_token", NativeType::Int)
                .with_clustering_key("a", NativeType::Int)
                .with_clustering_key("b", NativeType::Int)
                .with_clustering_key("c", NativeType::Int),
        )
    }

    fn local_idx_schema() -> Arc<TableSchema> {
        Arc::new(
            TableSchema::new("d_index_local")
                .with_partition_key("a", NativeType::Int)
                .with_clustering_key("d", NativeType::Text)
                .with_clustering_key("b", NativeType::Int)
                .with_clustering_key("c", NativeType::Int),
        )
    }

    fn classify(atoms: Vec<Atom>, kind: IndexKind) -> QueryRestrictions {
        let catalog =
            IndexCatalog::new().with_index(IndexDef::new("d_idx", "d", kind, EqualityIndex));
        QueryRestrictions::classify(
            base_schema(),
            StatementKind::Select,
            atoms,
            &catalog,
            ClassifyOptions {
                allow_filtering: true,
                ..ClassifyOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_global_prefix_structure() {
        let restrictions = classify(
            vec![
                Atom::eq("a", Value::Int(1)),
                Atom::eq("b", Value::Int(2)),
                Atom::eq("d", Value::text("x")),
            ],
            IndexKind::Global,
        );
        let prepared = restrictions.prepare_indexed_global(global_idx_schema()).unwrap();
        let prefix = prepared.idx_ck_prefix();
        assert_eq!(prefix.len(), 3);
        assert!(matches!(
            &prefix[0],
            IdxPrefixElement::TokenPlaceholder { column } if column == "idx_token"
        ));
        // partition element then clustering element, order preserved
        assert!(matches!(
            &prefix[1],
            IdxPrefixElement::Element(PrefixElement::Single(r)) if r.column == "a"
        ));
        assert!(matches!(
            &prefix[2],
            IdxPrefixElement::Element(PrefixElement::Single(r)) if r.column == "b"
        ));
    }

    #[test]
    fn test_global_ranges_fix_token_per_key() {
        let restrictions = classify(
            vec![
                Atom::eq("a", Value::Int(1)),
                Atom::eq("b", Value::Int(2)),
                Atom::eq("d", Value::text("x")),
            ],
            IndexKind::Global,
        );
        let prepared = restrictions.prepare_indexed_global(global_idx_schema()).unwrap();
        let ranges = prepared
            .get_global_index_clustering_ranges(&Bindings::none())
            .unwrap();
        assert_eq!(ranges.len(), 1);
        let token = Token::for_key(&[Value::Int(1)]);
        let expected = vec![Value::Int(token.0), Value::Int(1), Value::Int(2)];
        assert_eq!(ranges[0].start.as_ref().unwrap().prefix, expected);
        assert_eq!(ranges[0].end.as_ref().unwrap().prefix, expected);
    }

    #[test]
    fn test_global_ranges_enumerate_partition_in() {
        let restrictions = classify(
            vec![
                Atom::in_list("a", vec![Value::Int(1), Value::Int(2)]),
                Atom::eq("d", Value::text("x")),
            ],
            IndexKind::Global,
        );
        let prepared = restrictions.prepare_indexed_global(global_idx_schema()).unwrap();
        let ranges = prepared
            .get_global_index_clustering_ranges(&Bindings::none())
            .unwrap();
        assert_eq!(ranges.len(), 2);
        // sorted by token value, whatever the hash order turned out to be
        let starts: Vec<_> = ranges
            .iter()
            .map(|r| r.start.as_ref().unwrap().prefix[0].clone())
            .collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn test_token_variant_bounds_leading_component() {
        let restrictions = classify(
            vec![
                Atom::token(vec!["a".into()], Operator::Gt, Value::Int(10).into()),
                Atom::eq("d", Value::text("x")),
            ],
            IndexKind::Global,
        );
        let prepared = restrictions.prepare_indexed_global(global_idx_schema()).unwrap();
        // the per-key variant refuses token-restricted statements
        assert!(prepared
            .get_global_index_clustering_ranges(&Bindings::none())
            .is_err());
        let ranges = prepared
            .get_global_index_token_clustering_ranges(&Bindings::none())
            .unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(
            ranges[0].start,
            Some(RangeBound {
                prefix: vec![Value::Int(10)],
                inclusive: false
            })
        );
        assert_eq!(ranges[0].end, None);
    }

    #[test]
    fn test_local_ranges_lead_with_indexed_column() {
        let restrictions = classify(
            vec![
                Atom::eq("a", Value::Int(1)),
                Atom::eq("b", Value::Int(2)),
                Atom::gt("c", Value::Int(5)),
                Atom::eq("d", Value::text("x")),
            ],
            IndexKind::Local,
        );
        let prepared = restrictions.prepare_indexed_local(local_idx_schema()).unwrap();
        let ranges = prepared
            .get_local_index_clustering_ranges(&Bindings::none())
            .unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(
            ranges[0].start,
            Some(RangeBound {
                prefix: vec![Value::text("x"), Value::Int(2), Value::Int(5)],
                inclusive: false
            })
        );
        assert_eq!(
            ranges[0].end,
            Some(RangeBound {
                prefix: vec![Value::text("x"), Value::Int(2)],
                inclusive: true
            })
        );
    }

    #[test]
    fn test_relabel_preserves_order_and_values() {
        let restrictions = classify(
            vec![
                Atom::eq("a", Value::Int(1)),
                Atom::in_list("b", vec![Value::Int(2), Value::Int(3)]),
                Atom::eq("d", Value::text("x")),
            ],
            IndexKind::Global,
        );
        let prepared = restrictions.prepare_indexed_global(global_idx_schema()).unwrap();
        let elements: Vec<String> = prepared
            .idx_ck_prefix()
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(
            elements,
            vec!["idx_token = <token>", "a = 1", "b IN (2, 3)"]
        );
    }

    #[test]
    fn test_wrong_mode_is_rejected() {
        let restrictions = classify(vec![Atom::eq("d", Value::text("x"))], IndexKind::Global);
        let prepared = restrictions.prepare_indexed_global(global_idx_schema()).unwrap();
        assert!(prepared
            .get_local_index_clustering_ranges(&Bindings::none())
            .is_err());
    }

    #[test]
    fn test_missing_index_column_fails_preparation() {
        let bad_idx = Arc::new(
            TableSchema::new("broken")
                .with_partition_key("d", NativeType::Text)
                .with_clustering_key("idx_token", NativeType::Int),
        );
        let restrictions = classify(
            vec![Atom::eq("a", Value::Int(1)), Atom::eq("d", Value::text("x"))],
            IndexKind::Global,
        );
        assert!(restrictions.prepare_indexed_global(bad_idx).is_err());
    }
}
