//! Blocking plus scoring: record linkage, deduplication and search

use linkx_core::{
    connected_components, linked_components, BlockIndex, Cluster, Error, MemoryBlockIndex, Record, RecordId,
    RecordSet, Result, ScoredPair,
};
use linkx_similarity::TrainedModel;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::threshold::select_threshold;

/// Reference matches for one query: `(id, score)` sorted by score
/// descending then ID ascending
pub type MatchResult = Vec<(RecordId, f64)>;

type Pair = (Arc<Record>, Arc<Record>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Keep at most this many matches per search query
    pub search_limit: Option<usize>,
    /// Log a warning when one record's candidate set exceeds this size
    pub max_candidates_warn: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            search_limit: None,
            max_candidates_warn: 10_000,
        }
    }
}

impl MatchConfig {
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = Some(limit);
        self
    }

    pub fn with_max_candidates_warn(mut self, n: usize) -> Self {
        self.max_candidates_warn = n;
        self
    }
}

/// Drives a [`BlockIndex`] and a [`TrainedModel`].
///
/// `threshold`, `match_sets`, `dedupe` and `index` all rebuild the one
/// block index; only `index` leaves it ready for `search`.
pub struct Matcher {
    model: TrainedModel,
    index: Box<dyn BlockIndex>,
    config: MatchConfig,
    gazetteer: Option<RecordSet>,
}

impl Matcher {
    /// Matcher backed by an in-memory block index
    pub fn new(model: TrainedModel) -> Self {
        Self::with_index(model, Box::new(MemoryBlockIndex::new()))
    }

    pub fn with_index(model: TrainedModel, index: Box<dyn BlockIndex>) -> Self {
        Self {
            model,
            index,
            config: MatchConfig::default(),
            gazetteer: None,
        }
    }

    pub fn with_config(mut self, config: MatchConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    #[inline]
    pub fn threshold_value(&self) -> f64 {
        self.model.threshold()
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        self.model.set_threshold(threshold)
    }

    /// Learn a threshold from samples of both sides
    pub fn threshold(&mut self, sample_a: &RecordSet, sample_b: &RecordSet, recall_weight: f64) -> Result<f64> {
        let pairs = self.cross_pairs(sample_a, sample_b)?;
        let scores = self.model.similarity().score_pairs(&pairs)?;
        let threshold = select_threshold(&scores, recall_weight)?;
        tracing::info!(pairs = pairs.len(), recall_weight, threshold, "learned threshold");
        Ok(threshold)
    }

    /// Learn a threshold from a sample of one set
    pub fn threshold_dedupe(&mut self, sample: &RecordSet, recall_weight: f64) -> Result<f64> {
        let pairs = self.self_pairs(sample)?;
        let scores = self.model.similarity().score_pairs(&pairs)?;
        let threshold = select_threshold(&scores, recall_weight)?;
        tracing::info!(pairs = pairs.len(), recall_weight, threshold, "learned deduplication threshold");
        Ok(threshold)
    }

    /// Link `a` against `b`, keeping pairs scoring at least `threshold`.
    ///
    /// Cluster `members` come from `a` and `right_members` from `b`; the two
    /// sets may reuse the same IDs.
    pub fn match_sets(&mut self, a: &RecordSet, b: &RecordSet, threshold: f64) -> Result<Vec<Cluster>> {
        check_threshold(threshold)?;
        let pairs = self.cross_pairs(a, b)?;
        let edges = self.score_edges(&pairs, threshold, ScoredPair::linked)?;
        let clusters = linked_components(edges);
        tracing::info!(left = a.len(), right = b.len(), clusters = clusters.len(), threshold, "matched record sets");
        Ok(clusters)
    }

    /// Cluster duplicates within one set
    pub fn dedupe(&mut self, set: &RecordSet, threshold: f64) -> Result<Vec<Cluster>> {
        check_threshold(threshold)?;
        let pairs = self.self_pairs(set)?;
        let clusters = connected_components(self.score_edges(&pairs, threshold, ScoredPair::new)?);
        tracing::info!(records = set.len(), clusters = clusters.len(), threshold, "deduplicated record set");
        Ok(clusters)
    }

    /// Index a reference set for [`search`](Self::search)
    pub fn index(&mut self, reference: &RecordSet) -> Result<()> {
        self.gazetteer = None;
        self.index.build(self.model.predicates(), reference)?;
        self.gazetteer = Some(reference.clone());
        tracing::info!(
            records = reference.len(),
            predicates = self.model.predicates().len(),
            "indexed reference records"
        );
        Ok(())
    }

    /// Best reference matches for every query, keyed by query ID.
    ///
    /// A query without candidates maps to an empty result.
    pub fn search(&self, queries: &RecordSet) -> Result<BTreeMap<RecordId, MatchResult>> {
        let reference = self.gazetteer.as_ref().ok_or(Error::IndexNotBuilt)?;
        let records = queries.to_vec();
        let results: Vec<(RecordId, MatchResult)> = records
            .par_iter()
            .map(|q| -> Result<(RecordId, MatchResult)> {
                Ok((q.id.clone(), self.search_in(reference, q, self.config.search_limit)?))
            })
            .collect::<Result<_>>()?;

        let matched = results.iter().filter(|(_, r)| !r.is_empty()).count();
        tracing::info!(queries = records.len(), matched, "search complete");
        Ok(results.into_iter().collect())
    }

    /// Best reference matches for a single record
    pub fn search_one(&self, record: &Record, limit: Option<usize>) -> Result<MatchResult> {
        let reference = self.gazetteer.as_ref().ok_or(Error::IndexNotBuilt)?;
        self.search_in(reference, record, limit)
    }

    fn search_in(&self, reference: &RecordSet, query: &Record, limit: Option<usize>) -> Result<MatchResult> {
        let candidates = self.index.candidates(query)?;
        self.warn_if_degenerate(query, candidates.len());

        let model = &self.model;
        let threshold = model.threshold();
        let mut result: MatchResult = candidates
            .iter()
            .filter_map(|id| reference.get(id))
            .map(|candidate| (candidate.id.clone(), model.score_pair(query, candidate)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        result.sort_by(|x, y| OrderedFloat(y.1).cmp(&OrderedFloat(x.1)).then_with(|| x.0.cmp(&y.0)));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    /// Blocked pairs `(a, b)` with `a` from the left set, ordered by IDs
    fn cross_pairs(&mut self, a: &RecordSet, b: &RecordSet) -> Result<Vec<Pair>> {
        self.gazetteer = None;
        self.index.build(self.model.predicates(), b)?;

        let left = a.to_vec();
        let nested: Vec<Vec<Pair>> = left
            .par_iter()
            .map(|record| -> Result<Vec<Pair>> {
                let candidates = self.index.candidates(record)?;
                self.warn_if_degenerate(record, candidates.len());
                Ok(candidates
                    .iter()
                    .filter_map(|id| b.get(id))
                    .map(|other| (Arc::clone(record), Arc::clone(other)))
                    .collect())
            })
            .collect::<Result<_>>()?;

        let pairs: Vec<Pair> = nested.into_iter().flatten().collect();
        tracing::debug!(left = a.len(), right = b.len(), pairs = pairs.len(), "blocked cross pairs");
        Ok(pairs)
    }

    /// Blocked pairs within one set, each unordered pair once (`a < b`)
    fn self_pairs(&mut self, set: &RecordSet) -> Result<Vec<Pair>> {
        self.gazetteer = None;
        self.index.build(self.model.predicates(), set)?;

        let records = set.to_vec();
        let nested: Vec<Vec<Pair>> = records
            .par_iter()
            .map(|record| -> Result<Vec<Pair>> {
                let candidates = self.index.self_candidates(record)?;
                self.warn_if_degenerate(record, candidates.len());
                Ok(candidates
                    .range((std::ops::Bound::Excluded(&record.id), std::ops::Bound::Unbounded))
                    .filter_map(|id| set.get(id))
                    .map(|other| (Arc::clone(record), Arc::clone(other)))
                    .collect())
            })
            .collect::<Result<_>>()?;

        let pairs: Vec<Pair> = nested.into_iter().flatten().collect();
        tracing::debug!(records = set.len(), pairs = pairs.len(), "blocked pairs within set");
        Ok(pairs)
    }

    fn score_edges<F>(&self, pairs: &[Pair], threshold: f64, edge: F) -> Result<Vec<ScoredPair>>
    where
        F: Fn(RecordId, RecordId, f64) -> ScoredPair,
    {
        let scores = self.model.similarity().score_pairs(pairs)?;
        let edges: Vec<ScoredPair> = pairs
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score >= threshold)
            .map(|((a, b), score)| edge(a.id.clone(), b.id.clone(), score))
            .collect();
        tracing::debug!(candidates = pairs.len(), edges = edges.len(), "scored candidate pairs");
        Ok(edges)
    }

    fn warn_if_degenerate(&self, record: &Record, candidates: usize) {
        if candidates > self.config.max_candidates_warn {
            tracing::warn!(
                record = %record.id,
                candidates,
                "very large candidate set; blocking predicates may be too coarse"
            );
        }
    }
}

fn check_threshold(threshold: f64) -> Result<()> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(Error::config(format!("threshold {} outside [0, 1]", threshold)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkx_core::{Predicate, PredicateKind};
    use linkx_schema::{ComparatorRegistry, FieldDeclaration, FieldSchema};
    use linkx_similarity::Scorer;

    fn model(threshold: f64) -> TrainedModel {
        let schema = FieldSchema::new(vec![FieldDeclaration::string("address")], &ComparatorRegistry::new()).unwrap();
        let scorer = Scorer {
            weights: vec![12.0],
            missing_weights: vec![0.0],
            bias: -9.0,
        };
        TrainedModel::new(
            schema,
            scorer,
            vec![Predicate::new("address", PredicateKind::FirstToken)],
            threshold,
        )
        .unwrap()
    }

    fn set(records: &[(&str, &str)]) -> RecordSet {
        records
            .iter()
            .map(|(id, address)| Record::from_pairs(RecordId::from(*id), [("address", *address)]))
            .collect()
    }

    #[test]
    fn test_search_before_index() {
        let matcher = Matcher::new(model(0.5));
        assert!(matches!(
            matcher.search(&set(&[("m1", "100 main st")])),
            Err(Error::IndexNotBuilt)
        ));
    }

    #[test]
    fn test_search_gazetteer() {
        let mut matcher = Matcher::new(model(0.5));
        matcher
            .index(&set(&[("c1", "100 main st"), ("c2", "200 oak ave"), ("c3", "100 maple dr")]))
            .unwrap();
        let results = matcher
            .search(&set(&[("m1", "100 main st"), ("m2", "999 nowhere")]))
            .unwrap();

        let m1 = &results[&RecordId::from("m1")];
        assert_eq!(m1[0].0, RecordId::from("c1"));
        assert!(m1[0].1 > 0.5);
        assert!(m1.iter().all(|(id, _)| id != &RecordId::from("c2")));
        assert!(results[&RecordId::from("m2")].is_empty());
    }

    #[test]
    fn test_search_one_limit() {
        let mut matcher = Matcher::new(model(0.0));
        matcher
            .index(&set(&[("c1", "100 main st"), ("c3", "100 maple dr")]))
            .unwrap();
        let query = Record::from_pairs(RecordId::from("m1"), [("address", "100 main st")]);
        assert_eq!(matcher.search_one(&query, None).unwrap().len(), 2);
        let top = matcher.search_one(&query, Some(1)).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, RecordId::from("c1"));
    }

    #[test]
    fn test_match_sets_extremes() {
        let a = set(&[("m1", "100 main st"), ("m2", "200 oak avenue")]);
        let b = set(&[("c1", "100 main st"), ("c2", "200 oak ave"), ("c3", "300 elm")]);
        let mut matcher = Matcher::new(model(0.5));

        let all = matcher.match_sets(&a, &b, 0.0).unwrap();
        let edges: usize = all.iter().map(|c| c.edges.len()).sum();
        assert_eq!(edges, 2);

        let exact = matcher.match_sets(&a, &b, 1.0).unwrap();
        for cluster in &exact {
            assert!(cluster.edges.iter().all(|e| e.score == 1.0));
        }

        assert!(matcher.match_sets(&a, &b, 1.5).is_err());
    }

    #[test]
    fn test_dedupe_pairs_once() {
        let records = set(&[("1", "100 main st"), ("2", "100 main street"), ("3", "500 lake")]);
        let mut matcher = Matcher::new(model(0.5));
        let clusters = matcher.dedupe(&records, 0.5).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![RecordId::from("1"), RecordId::from("2")]);
        assert_eq!(clusters[0].edges.len(), 1);
    }

    #[test]
    fn test_shared_ids_across_sets() {
        let int_set = |address: &str| -> RecordSet {
            std::iter::once(Record::from_pairs(RecordId::Integer(0), [("address", address)])).collect()
        };
        let reference = int_set("100 main st");
        let queries = int_set("100 main street");
        let mut matcher = Matcher::new(model(0.5));

        let clusters = matcher.match_sets(&queries, &reference, 0.5).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![RecordId::Integer(0)]);
        assert_eq!(clusters[0].right_members, vec![RecordId::Integer(0)]);
        assert!(clusters[0].edges[0].score > 0.5);

        matcher.index(&reference).unwrap();
        let results = matcher.search(&queries).unwrap();
        assert_eq!(results[&RecordId::Integer(0)].len(), 1);
        assert_eq!(results[&RecordId::Integer(0)][0].0, RecordId::Integer(0));
    }

    #[test]
    fn test_match_invalidates_gazetteer() {
        let mut matcher = Matcher::new(model(0.5));
        let reference = set(&[("c1", "100 main st")]);
        matcher.index(&reference).unwrap();
        matcher.match_sets(&set(&[("m1", "100 main st")]), &reference, 0.5).unwrap();
        assert!(matches!(
            matcher.search_one(&Record::from_pairs(RecordId::from("q"), [("address", "x")]), None),
            Err(Error::IndexNotBuilt)
        ));
    }

    #[test]
    fn test_threshold_learning() {
        let a = set(&[("m1", "100 main st"), ("m2", "200 oak avenue")]);
        let b = set(&[("c1", "100 main st"), ("c2", "200 oak ave"), ("c3", "200 pine")]);
        let mut matcher = Matcher::new(model(0.5));
        let t = matcher.threshold(&a, &b, 1.0).unwrap();
        assert!((0.0..=1.0).contains(&t));

        let empty = matcher.threshold(&set(&[("q", "999")]), &b, 1.0).unwrap();
        assert_eq!(empty, 0.5);
    }
}
