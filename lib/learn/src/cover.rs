//! Greedy set cover over blocking predicates

use linkx_core::Predicate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How equally good predicates are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Fewest estimated collisions first, then catalogue order
    #[default]
    FewestCollisions,
    /// Catalogue order only
    CatalogueOrder,
}

/// A predicate together with the duplicates it covers
#[derive(Debug, Clone)]
pub struct CoverCandidate {
    pub predicate: Predicate,
    /// Indices of labeled duplicates sharing a key under this predicate
    pub covered: BTreeSet<usize>,
    /// Estimated number of sampled pairs this predicate blocks together
    pub collisions: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CoverResult {
    pub chosen: Vec<Predicate>,
    /// Duplicates no chosen predicate covers
    pub uncovered: BTreeSet<usize>,
}

/// Pick predicates until at least `total - budget` duplicates are covered or
/// nothing adds coverage.
pub fn greedy_cover(mut candidates: Vec<CoverCandidate>, total: usize, budget: usize, tie_break: TieBreak) -> CoverResult {
    let mut uncovered: BTreeSet<usize> = (0..total).collect();
    let target = total.saturating_sub(budget);
    let mut chosen = Vec::new();

    while total - uncovered.len() < target {
        let mut best: Option<(usize, usize)> = None; // (position, gain)
        for (pos, candidate) in candidates.iter().enumerate() {
            let gain = candidate.covered.intersection(&uncovered).count();
            if gain == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_pos, best_gain)) => {
                    gain > best_gain
                        || (gain == best_gain
                            && tie_break == TieBreak::FewestCollisions
                            && candidate.collisions < candidates[best_pos].collisions)
                }
            };
            if better {
                best = Some((pos, gain));
            }
        }

        let Some((pos, gain)) = best else {
            break;
        };
        let picked = candidates.remove(pos);
        for dupe in &picked.covered {
            uncovered.remove(dupe);
        }
        tracing::debug!(
            predicate = %picked.predicate,
            gain,
            collisions = picked.collisions,
            remaining = uncovered.len(),
            "selected blocking predicate"
        );
        chosen.push(picked.predicate);
    }

    CoverResult { chosen, uncovered }
}
