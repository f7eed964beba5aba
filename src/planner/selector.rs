//! Secondary index selection
//!
//! Scores the candidate indexes against the restrictions eligible for
//! indexing and picks at most one. The induced order is total: identical
//! input always selects the same index.
//!
//! Score components, strongest first:
//! 1. Operator weight of the best supported restriction (equality 3,
//!    containment 2, bounded range / pattern 1)
//! 2. How many eligible restriction atoms the index can serve
//! 3. Local placement over global (no cross-node fan-out for equal coverage)
//!
//! Remaining ties break on index name, ascending.

use tracing::trace;

use crate::expr::{Atom, Operator};
use crate::index::{IndexCatalog, IndexDef};

use super::restrictions::{ChosenIndex, QueryRestrictions};

/// Weight of one operator for index scoring
fn operator_weight(op: Operator) -> u64 {
    match op {
        Operator::Eq | Operator::In => 3,
        Operator::Contains | Operator::ContainsKey => 2,
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte | Operator::Like => 1,
        Operator::IsNotNull => 0,
    }
}

impl QueryRestrictions {
    /// Scores one candidate index against the eligible restrictions.
    ///
    /// Higher is better; zero means the index cannot serve any eligible
    /// restriction. The exact scale is an implementation detail; only the
    /// induced order is contractual.
    pub fn score(&self, index: &IndexDef) -> u64 {
        let supported = self.supported_atoms(index);
        let Some(best) = supported.iter().map(|a| operator_weight(a.op)).max() else {
            return 0;
        };
        let coverage = (supported.len() as u64).min(0xFFFF);
        let local = u64::from(index.is_local());
        (best << 32) | (coverage << 8) | local
    }

    /// Picks the best candidate index, together with the restriction that
    /// justified the choice. Returns `None` when no index qualifies.
    pub fn find_idx(&self, catalog: &IndexCatalog) -> Option<ChosenIndex> {
        let mut best: Option<(u64, &IndexDef)> = None;
        for index in catalog.indexes() {
            let score = self.score(index);
            if score == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_score, best_index)) => {
                    score > best_score
                        || (score == best_score && index.name() < best_index.name())
                }
            };
            if better {
                best = Some((score, index));
            }
        }

        best.and_then(|(score, index)| {
            let restriction = self.justifying_restriction(index)?;
            trace!(
                index = index.name(),
                score,
                restriction = %restriction,
                "selected secondary index"
            );
            Some(ChosenIndex {
                index: index.clone(),
                restriction,
            })
        })
    }

    /// Answers whether the partition-key restrictions alone could be served
    /// by some candidate index. Local indexes require an already-known
    /// partition to be useful, so they count only when `allow_local` is set.
    pub fn partition_key_restrictions_have_supporting_index(
        &self,
        catalog: &IndexCatalog,
        allow_local: bool,
    ) -> bool {
        self.partition.columns().any(|restriction| {
            catalog.indexes_on(&restriction.column).any(|index| {
                (allow_local || !index.is_local())
                    && restriction.atoms.iter().any(|a| index.supports(a.op))
            })
        })
    }

    /// Eligible restriction atoms the index can serve
    fn supported_atoms(&self, index: &IndexDef) -> Vec<&Atom> {
        self.index_restrictions()
            .into_iter()
            .filter(|a| a.single_column() == Some(index.target()) && index.supports(a.op))
            .collect()
    }

    /// The strongest supported atom
    fn justifying_restriction(&self, index: &IndexDef) -> Option<Atom> {
        self.supported_atoms(index)
            .iter()
            .max_by_key(|a| operator_weight(a.op))
            .map(|a| (*a).clone())
    }
}
