//! Range computation
//!
//! Runs at execution time, once bound variables are known: turns the
//! partition bucket into a token interval or an enumerated key set, and the
//! clustering prefix into an ordered set of non-overlapping ranges.
//!
//! An empty result is a normal outcome, not an error; emptiness caused by a
//! null bound is distinguished via `range_or_slice_eq_null`.

use std::fmt;

use crate::expr::{Bindings, Rhs, Term, Value};
use crate::token::{Token, TokenBound, TokenRange};

use super::combinations::Combinations;
use super::errors::{RestrictionError, RestrictionResult};
use super::prefix::PrefixElement;
use super::restrictions::QueryRestrictions;

/// One concrete partition key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartitionKey {
    /// Key column values, in partition-key order
    pub values: Vec<Value>,
}

impl PartitionKey {
    /// The ring token of this key
    pub fn token(&self) -> Token {
        Token::for_key(&self.values)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

/// How the partition key space is scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionScan {
    /// The whole key space; narrowing happens by filtering
    Unbounded,
    /// A contiguous token interval
    Token(TokenRange),
    /// An enumerated set of exact keys, in value order
    Keys(Vec<PartitionKey>),
    /// Provably no partition matches
    Empty,
}

/// One end of a clustering range. A prefix shorter than the full clustering
/// key bounds every row sharing that prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBound {
    /// Bound values, a clustering-key prefix
    pub prefix: Vec<Value>,
    /// Whether rows matching the bound itself are included
    pub inclusive: bool,
}

/// A contiguous clustering range; `None` ends are open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusteringRange {
    /// Lower end
    pub start: Option<RangeBound>,
    /// Upper end
    pub end: Option<RangeBound>,
}

impl ClusteringRange {
    /// The full clustering space
    pub fn full() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// True when both ends are open
    pub fn is_full(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

impl fmt::Display for ClusteringRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_bound =
            |f: &mut fmt::Formatter<'_>, bound: &RangeBound| -> fmt::Result {
                write!(f, "(")?;
                for (i, v) in bound.prefix.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            };
        match &self.start {
            Some(b) => {
                write!(f, "{}", if b.inclusive { "[" } else { "(" })?;
                write_bound(f, b)?;
            }
            None => write!(f, "(-inf")?,
        }
        write!(f, ", ")?;
        match &self.end {
            Some(b) => {
                write_bound(f, b)?;
                write!(f, "{}", if b.inclusive { "]" } else { ")" })
            }
            None => write!(f, "+inf)"),
        }
    }
}

/// A resolved trailing bounded-range element
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolvedSlice {
    pub lower: Option<(Vec<Value>, bool)>,
    pub upper: Option<(Vec<Value>, bool)>,
}

/// Prefix elements after bound-variable resolution
pub(crate) enum ResolvedPrefix {
    /// Per-element candidate tuples, sorted, plus the optional trailing slice
    Ranges {
        axes: Vec<Vec<Vec<Value>>>,
        slice: Option<ResolvedSlice>,
    },
    /// Some bound resolved to null; the scan is provably empty
    NullBound,
}

fn resolve_term(bindings: &Bindings, term: &Term) -> RestrictionResult<Value> {
    bindings
        .resolve(term)
        .ok_or_else(|| match term {
            Term::Marker(marker) => RestrictionError::UnresolvedMarker { marker: *marker },
            Term::Literal(_) => unreachable!("literals always resolve"),
        })
}

fn resolve_terms(bindings: &Bindings, terms: &[Term]) -> RestrictionResult<Vec<Value>> {
    terms.iter().map(|t| resolve_term(bindings, t)).collect()
}

/// Resolves prefix elements into candidate axes and the optional trailing
/// slice. Only the last element may carry bounds; construction guarantees
/// that.
pub(crate) fn resolve_elements(
    elements: &[PrefixElement],
    bindings: &Bindings,
) -> RestrictionResult<ResolvedPrefix> {
    let mut axes: Vec<Vec<Vec<Value>>> = Vec::new();
    let mut slice: Option<ResolvedSlice> = None;

    for element in elements {
        match element {
            PrefixElement::Single(restriction) => {
                if let Some(term) = restriction.eq_term() {
                    let value = resolve_term(bindings, term)?;
                    if value.is_null() {
                        return Ok(ResolvedPrefix::NullBound);
                    }
                    axes.push(vec![vec![value]]);
                } else if let Some(terms) = restriction.in_terms() {
                    let values = resolve_terms(bindings, terms)?;
                    if values.iter().any(Value::is_null) {
                        return Ok(ResolvedPrefix::NullBound);
                    }
                    let mut candidates: Vec<Vec<Value>> =
                        values.into_iter().map(|v| vec![v]).collect();
                    candidates.sort();
                    candidates.dedup();
                    axes.push(candidates);
                } else {
                    let mut resolved = ResolvedSlice::default();
                    if let Some((term, inclusive)) = restriction.lower() {
                        let value = resolve_term(bindings, term)?;
                        if value.is_null() {
                            return Ok(ResolvedPrefix::NullBound);
                        }
                        resolved.lower = Some((vec![value], inclusive));
                    }
                    if let Some((term, inclusive)) = restriction.upper() {
                        let value = resolve_term(bindings, term)?;
                        if value.is_null() {
                            return Ok(ResolvedPrefix::NullBound);
                        }
                        resolved.upper = Some((vec![value], inclusive));
                    }
                    slice = Some(resolved);
                }
            }
            PrefixElement::Multi { atoms, .. } => {
                let exact = atoms
                    .iter()
                    .all(|a| matches!(a.op, crate::expr::Operator::Eq | crate::expr::Operator::In));
                if exact {
                    let atom = &atoms[0];
                    match &atom.rhs {
                        Rhs::Tuple(terms) => {
                            let tuple = resolve_terms(bindings, terms)?;
                            if tuple.iter().any(Value::is_null) {
                                return Ok(ResolvedPrefix::NullBound);
                            }
                            axes.push(vec![tuple]);
                        }
                        Rhs::TupleList(tuples) => {
                            let mut candidates = Vec::with_capacity(tuples.len());
                            for terms in tuples {
                                let tuple = resolve_terms(bindings, terms)?;
                                if tuple.iter().any(Value::is_null) {
                                    return Ok(ResolvedPrefix::NullBound);
                                }
                                candidates.push(tuple);
                            }
                            candidates.sort();
                            candidates.dedup();
                            axes.push(candidates);
                        }
                        _ => {}
                    }
                } else {
                    let mut resolved = ResolvedSlice::default();
                    for atom in atoms {
                        let Rhs::Tuple(terms) = &atom.rhs else {
                            continue;
                        };
                        let tuple = resolve_terms(bindings, terms)?;
                        if tuple.iter().any(Value::is_null) {
                            return Ok(ResolvedPrefix::NullBound);
                        }
                        if atom.op.is_lower_bound() {
                            resolved.lower = Some((tuple, atom.op.is_inclusive()));
                        } else if atom.op.is_upper_bound() {
                            resolved.upper = Some((tuple, atom.op.is_inclusive()));
                        }
                    }
                    slice = Some(resolved);
                }
            }
        }
    }

    Ok(ResolvedPrefix::Ranges { axes, slice })
}

/// Assembles the ordered range set from resolved elements, with `lead`
/// values fixed before every combination (used by index-table prefixes)
pub(crate) fn assemble_ranges(lead: &[Value], resolved: ResolvedPrefix) -> Vec<ClusteringRange> {
    let (axes, slice) = match resolved {
        ResolvedPrefix::NullBound => return Vec::new(),
        ResolvedPrefix::Ranges { axes, slice } => (axes, slice),
    };

    let mut out = Vec::new();
    for combination in Combinations::new(axes) {
        let fixed: Vec<Value> = lead.iter().cloned().chain(combination).collect();
        match &slice {
            None => {
                if fixed.is_empty() {
                    out.push(ClusteringRange::full());
                } else {
                    out.push(ClusteringRange {
                        start: Some(RangeBound {
                            prefix: fixed.clone(),
                            inclusive: true,
                        }),
                        end: Some(RangeBound {
                            prefix: fixed,
                            inclusive: true,
                        }),
                    });
                }
            }
            Some(bounds) => {
                let start = bounds.lower.as_ref().map(|(values, inclusive)| RangeBound {
                    prefix: fixed.iter().cloned().chain(values.iter().cloned()).collect(),
                    inclusive: *inclusive,
                });
                let end = bounds.upper.as_ref().map(|(values, inclusive)| RangeBound {
                    prefix: fixed.iter().cloned().chain(values.iter().cloned()).collect(),
                    inclusive: *inclusive,
                });
                // an open side still stays inside the fixed prefix
                let start = start.or_else(|| {
                    (!fixed.is_empty()).then(|| RangeBound {
                        prefix: fixed.clone(),
                        inclusive: true,
                    })
                });
                let end = end.or_else(|| {
                    (!fixed.is_empty()).then(|| RangeBound {
                        prefix: fixed.clone(),
                        inclusive: true,
                    })
                });
                out.push(ClusteringRange { start, end });
            }
        }
    }
    out
}

impl QueryRestrictions {
    /// Computes the partition scan for this statement.
    ///
    /// Token restrictions produce a token interval (empty when
    /// unsatisfiable); a fully pinned partition key enumerates the
    /// cross-product of exact keys; anything else scans the whole key space,
    /// narrowed later by index lookups or filtering.
    pub fn get_partition_key_ranges(
        &self,
        bindings: &Bindings,
    ) -> RestrictionResult<PartitionScan> {
        if self.partition.token.is_some() {
            let range = self.resolve_token_range(bindings)?;
            if range.is_empty() {
                return Ok(PartitionScan::Empty);
            }
            return Ok(PartitionScan::Token(range));
        }

        if self.partition_fully_exact() {
            let axes = match self.partition_axes(bindings)? {
                Some(axes) => axes,
                None => return Ok(PartitionScan::Empty),
            };
            let keys: Vec<PartitionKey> = Combinations::new(axes)
                .map(|values| PartitionKey { values })
                .collect();
            return Ok(PartitionScan::Keys(keys));
        }

        Ok(PartitionScan::Unbounded)
    }

    /// Computes the ordered clustering ranges for the base table.
    ///
    /// One range per enumerated prefix combination; no clustering
    /// restrictions yield a single full range.
    pub fn get_clustering_bounds(
        &self,
        bindings: &Bindings,
    ) -> RestrictionResult<Vec<ClusteringRange>> {
        let resolved = resolve_elements(&self.clustering.prefix, bindings)?;
        Ok(assemble_ranges(&[], resolved))
    }

    /// True exactly when the partition or clustering scan is empty because a
    /// bound resolved to null, as opposed to legitimately matching nothing.
    /// Callers short-circuit to zero rows without touching storage.
    pub fn range_or_slice_eq_null(&self, bindings: &Bindings) -> bool {
        if self.partition.token.is_none()
            && self.partition_fully_exact()
            && matches!(self.partition_axes(bindings), Ok(None))
        {
            return true;
        }
        matches!(
            resolve_elements(&self.clustering.prefix, bindings),
            Ok(ResolvedPrefix::NullBound)
        )
    }

    /// Resolves per-column partition axes; `None` when a value is null
    pub(crate) fn partition_axes(
        &self,
        bindings: &Bindings,
    ) -> RestrictionResult<Option<Vec<Vec<Vec<Value>>>>> {
        let mut axes = Vec::with_capacity(self.partition.by_column.len());
        for restriction in self.partition.columns() {
            if let Some(term) = restriction.eq_term() {
                let value = resolve_term(bindings, term)?;
                if value.is_null() {
                    return Ok(None);
                }
                axes.push(vec![vec![value]]);
            } else if let Some(terms) = restriction.in_terms() {
                let values = resolve_terms(bindings, terms)?;
                if values.iter().any(Value::is_null) {
                    return Ok(None);
                }
                let mut candidates: Vec<Vec<Value>> =
                    values.into_iter().map(|v| vec![v]).collect();
                candidates.sort();
                candidates.dedup();
                axes.push(candidates);
            }
        }
        Ok(Some(axes))
    }

    /// Resolves the token restriction into a concrete interval
    pub(crate) fn resolve_token_range(&self, bindings: &Bindings) -> RestrictionResult<TokenRange> {
        let token = self
            .partition
            .token
            .as_ref()
            .ok_or_else(|| RestrictionError::IndexPreparation {
                reason: "no token restriction present".to_string(),
            })?;

        let to_token = |term: &Term| -> RestrictionResult<Token> {
            let value = resolve_term(bindings, term)?;
            match value {
                Value::Null => Err(RestrictionError::NullTokenValue),
                Value::Int(t) => Ok(Token(t)),
                _ => Err(RestrictionError::InvalidTokenValue),
            }
        };

        if let Some(term) = token.eq_term() {
            let t = to_token(term)?;
            return Ok(TokenRange {
                start: Some(TokenBound::inclusive(t)),
                end: Some(TokenBound::inclusive(t)),
            });
        }

        let start = match token.lower() {
            Some((term, inclusive)) => Some(TokenBound {
                token: to_token(term)?,
                inclusive,
            }),
            None => None,
        };
        let end = match token.upper() {
            Some((term, inclusive)) => Some(TokenBound {
                token: to_token(term)?,
                inclusive,
            }),
            None => None,
        };
        Ok(TokenRange { start, end })
    }
}
