use ahash::AHashMap;
use parking_lot::RwLock;
use std::collections::BTreeSet;

use crate::predicate::Predicate;
use crate::record::{Record, RecordId, RecordSet};
use crate::{Error, Result};

/// Candidate generation over a reference set.
///
/// `build` is a single-writer phase that replaces any previous map. Once it
/// returns, `candidates` may be called from any number of threads.
pub trait BlockIndex: Send + Sync {
    /// Index every reference record under every predicate
    fn build(&self, predicates: &[Predicate], reference: &RecordSet) -> Result<()>;

    /// Reference IDs sharing at least one key with `query`.
    ///
    /// The query's own ID is not filtered: when two different sets are
    /// linked, a reference record may legitimately carry the same ID.
    fn candidates(&self, query: &Record) -> Result<BTreeSet<RecordId>>;

    /// Candidates of a record matched against its own set, without itself
    fn self_candidates(&self, query: &Record) -> Result<BTreeSet<RecordId>> {
        let mut out = self.candidates(query)?;
        out.remove(&query.id);
        Ok(out)
    }

    fn is_built(&self) -> bool;
}

/// Blocking map keyed by (predicate position, key)
type BlockingMap = AHashMap<(u32, String), BTreeSet<RecordId>>;

struct BlockState {
    predicates: Vec<Predicate>,
    map: BlockingMap,
}

/// In-memory block index
pub struct MemoryBlockIndex {
    state: RwLock<Option<BlockState>>,
}

impl MemoryBlockIndex {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }

    /// Number of distinct (predicate, key) blocks
    pub fn block_count(&self) -> usize {
        self.state.read().as_ref().map_or(0, |s| s.map.len())
    }
}

impl Default for MemoryBlockIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockIndex for MemoryBlockIndex {
    fn build(&self, predicates: &[Predicate], reference: &RecordSet) -> Result<()> {
        // Held for the whole build so no lookup observes a partial map
        let mut guard = self.state.write();

        let mut map = BlockingMap::default();
        for record in reference.iter() {
            for (pos, predicate) in predicates.iter().enumerate() {
                for key in predicate.keys(record) {
                    map.entry((pos as u32, key))
                        .or_default()
                        .insert(record.id.clone());
                }
            }
        }

        tracing::debug!(
            records = reference.len(),
            predicates = predicates.len(),
            blocks = map.len(),
            "built in-memory block index"
        );

        *guard = Some(BlockState {
            predicates: predicates.to_vec(),
            map,
        });
        Ok(())
    }

    fn candidates(&self, query: &Record) -> Result<BTreeSet<RecordId>> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(Error::IndexNotBuilt)?;

        let mut out = BTreeSet::new();
        for (pos, predicate) in state.predicates.iter().enumerate() {
            for key in predicate.keys(query) {
                if let Some(ids) = state.map.get(&(pos as u32, key)) {
                    out.extend(ids.iter().cloned());
                }
            }
        }
        Ok(out)
    }

    fn is_built(&self) -> bool {
        self.state.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::PredicateKind;
    use crate::record::FieldValue;

    fn rec(id: &str, address: &str) -> Record {
        Record::from_pairs(RecordId::from(id), [("address", FieldValue::from(address))])
    }

    fn reference() -> RecordSet {
        vec![
            rec("c1", "100 main st"),
            rec("c2", "200 oak ave"),
            rec("c3", "100 elm st"),
        ]
        .into_iter()
        .collect()
    }

    fn predicates() -> Vec<Predicate> {
        vec![Predicate::new("address", PredicateKind::FirstToken)]
    }

    #[test]
    fn test_candidates_before_build() {
        let index = MemoryBlockIndex::new();
        assert!(!index.is_built());
        assert!(matches!(
            index.candidates(&rec("q", "100 main")),
            Err(Error::IndexNotBuilt)
        ));
    }

    #[test]
    fn test_candidates_union_and_empty() {
        let index = MemoryBlockIndex::new();
        index.build(&predicates(), &reference()).unwrap();
        assert!(index.is_built());

        let hits = index.candidates(&rec("m1", "100 main street")).unwrap();
        let ids: Vec<_> = hits.into_iter().collect();
        assert_eq!(ids, vec![RecordId::from("c1"), RecordId::from("c3")]);

        assert!(index.candidates(&rec("m2", "999 nowhere")).unwrap().is_empty());
    }

    #[test]
    fn test_self_exclusion_only_when_asked() {
        let index = MemoryBlockIndex::new();
        index.build(&predicates(), &reference()).unwrap();
        let query = rec("c1", "100 main st");

        let hits = index.self_candidates(&query).unwrap();
        assert!(!hits.contains(&RecordId::from("c1")));
        assert!(hits.contains(&RecordId::from("c3")));

        // a record from another set may share the ID of a reference record
        let hits = index.candidates(&query).unwrap();
        assert!(hits.contains(&RecordId::from("c1")));
    }

    #[test]
    fn test_rebuild_replaces_map() {
        let index = MemoryBlockIndex::new();
        let mut set = reference();
        index.build(&predicates(), &set).unwrap();
        let first = index.candidates(&rec("q", "100")).unwrap();
        index.build(&predicates(), &set).unwrap();
        assert_eq!(first, index.candidates(&rec("q", "100")).unwrap());

        set.remove(&RecordId::from("c3"));
        index.build(&predicates(), &set).unwrap();
        let after = index.candidates(&rec("q", "100")).unwrap();
        assert!(!after.contains(&RecordId::from("c3")));
    }
}
