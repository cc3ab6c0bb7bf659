//! Deterministic pair sampling
//!
//! All samplers draw from a caller-provided `StdRng` so a fixed seed gives a
//! fixed sample. Returned pairs are ordered by their position in the inputs.

use ahash::{AHashMap, AHashSet};
use linkx_core::{Predicate, Record};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use std::sync::Arc;

pub type Pair = (Arc<Record>, Arc<Record>);

/// Up to `n` distinct `(a[i], b[j])` pairs drawn without replacement
pub fn random_cross_pairs(a: &[Arc<Record>], b: &[Arc<Record>], n: usize, rng: &mut StdRng) -> Vec<(usize, usize)> {
    let Some(total) = a.len().checked_mul(b.len()) else {
        return rejection_sample(n, rng, |rng| {
            (rng.random_range(0..a.len()), rng.random_range(0..b.len()))
        });
    };
    if total == 0 || n == 0 {
        return Vec::new();
    }
    let mut picked: Vec<(usize, usize)> = index::sample(rng, total, n.min(total))
        .into_iter()
        .map(|k| (k / b.len(), k % b.len()))
        .collect();
    picked.sort_unstable();
    picked
}

/// Up to `n` distinct unordered pairs `i < j` within one set
pub fn random_self_pairs(len: usize, n: usize, rng: &mut StdRng) -> Vec<(usize, usize)> {
    if len < 2 || n == 0 {
        return Vec::new();
    }
    let Some(total) = len.checked_mul(len - 1).map(|t| t / 2) else {
        return rejection_sample(n, rng, |rng| loop {
            let i = rng.random_range(0..len);
            let j = rng.random_range(0..len);
            if i != j {
                break (i.min(j), i.max(j));
            }
        });
    };
    let mut picked: Vec<(usize, usize)> = index::sample(rng, total, n.min(total))
        .into_iter()
        .map(|k| triangular_pair(len, k))
        .collect();
    picked.sort_unstable();
    picked
}

fn rejection_sample<F>(n: usize, rng: &mut StdRng, mut draw: F) -> Vec<(usize, usize)>
where
    F: FnMut(&mut StdRng) -> (usize, usize),
{
    let mut seen = AHashSet::with_capacity(n);
    while seen.len() < n {
        seen.insert(draw(rng));
    }
    let mut picked: Vec<_> = seen.into_iter().collect();
    picked.sort_unstable();
    picked
}

/// The `k`-th pair of the row-major enumeration of `i < j < len`
fn triangular_pair(len: usize, k: usize) -> (usize, usize) {
    // Row i starts at offset i*len - i*(i+1)/2
    let offset = |i: usize| i * len - i * (i + 1) / 2;
    let (mut lo, mut hi) = (0usize, len - 1);
    while lo + 1 < hi {
        let mid = (lo + hi) / 2;
        if offset(mid) <= k {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo, lo + 1 + (k - offset(lo)))
}

/// Index pairs that share a blocking key under any predicate.
///
/// With `b == None` pairs are drawn within `a` (`i < j`).
pub fn blocked_pairs(a: &[Arc<Record>], b: Option<&[Arc<Record>]>, predicates: &[Predicate]) -> Vec<(usize, usize)> {
    let targets = b.unwrap_or(a);
    let mut blocks: AHashMap<(usize, String), Vec<usize>> = AHashMap::new();
    for (j, record) in targets.iter().enumerate() {
        for (p, predicate) in predicates.iter().enumerate() {
            for key in predicate.keys(record) {
                blocks.entry((p, key)).or_default().push(j);
            }
        }
    }

    let mut out = AHashSet::new();
    for (i, record) in a.iter().enumerate() {
        for (p, predicate) in predicates.iter().enumerate() {
            for key in predicate.keys(record) {
                let Some(js) = blocks.get(&(p, key)) else {
                    continue;
                };
                for &j in js {
                    match b {
                        Some(_) => {
                            out.insert((i, j));
                        }
                        None if i < j => {
                            out.insert((i, j));
                        }
                        None => {}
                    }
                }
            }
        }
    }

    let mut pairs: Vec<_> = out.into_iter().collect();
    pairs.sort_unstable();
    pairs
}

/// Up to `n` items of `pool`, without replacement, in pool order
pub fn sample_from(pool: &[(usize, usize)], n: usize, rng: &mut StdRng) -> Vec<(usize, usize)> {
    if n >= pool.len() {
        return pool.to_vec();
    }
    let mut idx: Vec<usize> = index::sample(rng, pool.len(), n).into_vec();
    idx.sort_unstable();
    idx.into_iter().map(|k| pool[k]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkx_core::{PredicateKind, RecordId};
    use rand::SeedableRng;

    fn records(prefix: &str, values: &[&str]) -> Vec<Arc<Record>> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Arc::new(Record::from_pairs(
                    RecordId::tagged(prefix, i as u64),
                    [("address", *v)],
                ))
            })
            .collect()
    }

    #[test]
    fn test_cross_pairs_deterministic_and_distinct() {
        let a = records("a", &["1", "2", "3", "4"]);
        let b = records("b", &["1", "2", "3"]);
        let one = random_cross_pairs(&a, &b, 5, &mut StdRng::seed_from_u64(7));
        let two = random_cross_pairs(&a, &b, 5, &mut StdRng::seed_from_u64(7));
        assert_eq!(one, two);
        assert_eq!(one.len(), 5);
        let unique: AHashSet<_> = one.iter().collect();
        assert_eq!(unique.len(), 5);

        let all = random_cross_pairs(&a, &b, 100, &mut StdRng::seed_from_u64(7));
        assert_eq!(all.len(), 12);
    }

    #[test]
    fn test_triangular_enumeration() {
        let len = 5;
        let mut expected = Vec::new();
        for i in 0..len {
            for j in (i + 1)..len {
                expected.push((i, j));
            }
        }
        let got: Vec<_> = (0..expected.len()).map(|k| triangular_pair(len, k)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_self_pairs() {
        let pairs = random_self_pairs(4, 100, &mut StdRng::seed_from_u64(1));
        assert_eq!(pairs.len(), 6);
        assert!(pairs.iter().all(|(i, j)| i < j));
        assert!(random_self_pairs(1, 10, &mut StdRng::seed_from_u64(1)).is_empty());
    }

    #[test]
    fn test_blocked_pairs() {
        let a = records("a", &["100 main", "200 oak"]);
        let b = records("b", &["100 elm", "300 oak", "100 main"]);
        let predicates = vec![Predicate::new("address", PredicateKind::FirstToken)];
        assert_eq!(blocked_pairs(&a, Some(b.as_slice()), &predicates), vec![(0, 0), (0, 2)]);

        let dedupe = blocked_pairs(&b, None, &predicates);
        assert_eq!(dedupe, vec![(0, 2)]);
    }
}
