//! Active-learning trainer
//!
//! Lifecycle: `Untrained → Sampling → Labeling → Sampling → … → Trained`.
//! A trainer owns the active sample and the labeled corpus, refits its
//! scorer as labels arrive so it can ask about the most uncertain pair, and
//! finally learns blocking predicates by greedy set cover.

use ahash::AHashSet;
use linkx_core::{
    pair_key, Error, Label, LabeledPair, Predicate, PredicateKind, Record, RecordId, RecordSet, Result,
};
use linkx_schema::FieldSchema;
use linkx_similarity::{Learner, LogisticRegression, SimilarityModel, TrainedModel, DEFAULT_THRESHOLD};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::cover::{greedy_cover, CoverCandidate, TieBreak};
use crate::oracle::{LabelResponse, LabelingOracle};
use crate::sampling::{blocked_pairs, random_cross_pairs, random_self_pairs, sample_from, Pair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Untrained,
    Sampling,
    Labeling,
    Trained,
}

/// Options for [`Trainer::train`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    /// Drop predicates covering fewer labeled duplicates than this
    pub min_predicate_coverage: usize,
    /// Number of labeled duplicates blocking may leave uncovered
    pub uncovered_dupes: usize,
    /// Add stop-listed token predicates built from the reference records
    pub use_index_predicates: bool,
    /// Drop predicates that block together more than this fraction of the
    /// sampled pairs
    pub max_pair_fraction: f64,
    pub tie_break: TieBreak,
    /// Tokens in more than this fraction of reference records become stop
    /// words of index predicates
    pub index_max_df: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            min_predicate_coverage: 1,
            uncovered_dupes: 0,
            use_index_predicates: false,
            max_pair_fraction: 0.1,
            tie_break: TieBreak::FewestCollisions,
            index_max_df: 0.1,
        }
    }
}

impl TrainOptions {
    pub fn with_min_predicate_coverage(mut self, n: usize) -> Self {
        self.min_predicate_coverage = n;
        self
    }

    pub fn with_uncovered_dupes(mut self, n: usize) -> Self {
        self.uncovered_dupes = n;
        self
    }

    pub fn with_index_predicates(mut self, enabled: bool) -> Self {
        self.use_index_predicates = enabled;
        self
    }

    pub fn with_max_pair_fraction(mut self, fraction: f64) -> Self {
        self.max_pair_fraction = fraction;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_pair_fraction > 0.0 && self.max_pair_fraction <= 1.0) {
            return Err(Error::config(format!(
                "max_pair_fraction must be in (0, 1], got {}",
                self.max_pair_fraction
            )));
        }
        if !(self.index_max_df > 0.0 && self.index_max_df <= 1.0) {
            return Err(Error::config(format!(
                "index_max_df must be in (0, 1], got {}",
                self.index_max_df
            )));
        }
        Ok(())
    }
}

/// Outcome of a training run
#[derive(Debug, Clone, Default)]
pub struct TrainReport {
    pub matches: usize,
    pub distincts: usize,
    pub predicates: Vec<Predicate>,
    /// Labeled duplicates that no chosen predicate blocks together. They
    /// can never be found by the matcher.
    pub uncovered: Vec<(RecordId, RecordId)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Link,
    Dedupe,
}

pub struct Trainer {
    model: SimilarityModel,
    learner: Box<dyn Learner>,
    seed: u64,
    rng: StdRng,
    state: TrainerState,
    mode: Mode,
    records_a: Vec<Arc<Record>>,
    records_b: Vec<Arc<Record>>,
    sample: Vec<Pair>,
    labeled: BTreeMap<(RecordId, RecordId), LabeledPair>,
    skipped: AHashSet<(RecordId, RecordId)>,
    predicates: Vec<Predicate>,
}

impl Trainer {
    pub fn new(schema: FieldSchema) -> Self {
        Self {
            model: SimilarityModel::new(schema),
            learner: Box::new(LogisticRegression::default()),
            seed: 0,
            rng: StdRng::seed_from_u64(0),
            state: TrainerState::Untrained,
            mode: Mode::Link,
            records_a: Vec::new(),
            records_b: Vec::new(),
            sample: Vec::new(),
            labeled: BTreeMap::new(),
            skipped: AHashSet::new(),
            predicates: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_learner(mut self, learner: Box<dyn Learner>) -> Self {
        self.learner = learner;
        self
    }

    #[inline]
    pub fn state(&self) -> TrainerState {
        self.state
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn model(&self) -> &SimilarityModel {
        &self.model
    }

    /// Pairs of the active sample
    pub fn sample_pairs(&self) -> &[Pair] {
        &self.sample
    }

    pub fn labeled_pairs(&self) -> impl Iterator<Item = &LabeledPair> {
        self.labeled.values()
    }

    /// `(matches, distincts)` in the labeled corpus
    pub fn label_counts(&self) -> (usize, usize) {
        let matches = self.labeled.values().filter(|p| p.label == Label::Match).count();
        (matches, self.labeled.len() - matches)
    }

    /// Draw up to `sample_size` distinct pairs across two record sets.
    ///
    /// Once predicates have been learned, half of the sample comes from
    /// pairs that share a blocking key.
    pub fn sample(&mut self, set_a: &RecordSet, set_b: &RecordSet, sample_size: usize) -> Result<usize> {
        self.mode = Mode::Link;
        self.records_a = set_a.to_vec();
        self.records_b = set_b.to_vec();

        let blocked = if self.predicates.is_empty() {
            Vec::new()
        } else {
            blocked_pairs(&self.records_a, Some(self.records_b.as_slice()), &self.predicates)
        };
        let (a, b) = (&self.records_a, &self.records_b);
        let rng = &mut self.rng;
        let indices = mix_samples(&blocked, sample_size, rng, |n, rng| random_cross_pairs(a, b, n, rng));

        self.sample = indices
            .into_iter()
            .map(|(i, j)| (Arc::clone(&self.records_a[i]), Arc::clone(&self.records_b[j])))
            .collect();
        self.state = TrainerState::Sampling;

        tracing::info!(
            left = self.records_a.len(),
            right = self.records_b.len(),
            pairs = self.sample.len(),
            blocked = blocked.len(),
            "sampled record pairs"
        );
        Ok(self.sample.len())
    }

    /// Draw up to `sample_size` distinct unordered pairs within one set
    pub fn sample_dedupe(&mut self, set: &RecordSet, sample_size: usize) -> Result<usize> {
        self.mode = Mode::Dedupe;
        self.records_a = set.to_vec();
        self.records_b = Vec::new();

        let blocked = if self.predicates.is_empty() {
            Vec::new()
        } else {
            blocked_pairs(&self.records_a, None, &self.predicates)
        };
        let len = self.records_a.len();
        let rng = &mut self.rng;
        let indices = mix_samples(&blocked, sample_size, rng, |n, rng| random_self_pairs(len, n, rng));

        self.sample = indices
            .into_iter()
            .map(|(i, j)| (Arc::clone(&self.records_a[i]), Arc::clone(&self.records_a[j])))
            .collect();
        self.state = TrainerState::Sampling;

        tracing::info!(records = len, pairs = self.sample.len(), "sampled record pairs for deduplication");
        Ok(self.sample.len())
    }

    /// Merge labeled pairs into the corpus.
    ///
    /// Repeating a label is a no-op; a conflicting label replaces the old one.
    pub fn mark_pairs(&mut self, pairs: Vec<LabeledPair>) -> Result<()> {
        for pair in pairs {
            self.record_label(pair);
        }
        self.refit();
        Ok(())
    }

    /// Mark pairs given by ID, resolving records in `sets` in order.
    ///
    /// Pairs whose IDs cannot be resolved are skipped with a warning.
    /// Returns the number of pairs marked.
    pub fn mark_pairs_by_id(&mut self, pairs: &[(RecordId, RecordId, Label)], sets: &[&RecordSet]) -> Result<usize> {
        let resolve = |id: &RecordId| sets.iter().find_map(|set| set.get(id).cloned());
        let mut resolved = Vec::with_capacity(pairs.len());
        for (x, y, label) in pairs {
            match (resolve(x), resolve(y)) {
                (Some(a), Some(b)) => resolved.push(LabeledPair::new(a, b, *label)),
                _ => tracing::warn!(left = %x, right = %y, "skipping training pair with unknown record id"),
            }
        }
        let marked = resolved.len();
        self.mark_pairs(resolved)?;
        Ok(marked)
    }

    /// Mark the first record of each of the first `n` sampled pairs as a
    /// match with itself. Gives the learner positive examples before any
    /// human labeling.
    pub fn seed_exact_matches(&mut self, n: usize) -> Result<usize> {
        let seeds: Vec<LabeledPair> = self
            .sample
            .iter()
            .take(n)
            .map(|(a, _)| LabeledPair::new(Arc::clone(a), Arc::clone(a), Label::Match))
            .collect();
        let count = seeds.len();
        self.mark_pairs(seeds)?;
        Ok(count)
    }

    /// Next pair worth asking about.
    ///
    /// Before a scorer can be fitted this is the next unlabeled sampled pair;
    /// afterwards the unlabeled pair scoring closest to 0.5.
    pub fn uncertain_pair(&self) -> Option<Pair> {
        let open: Vec<usize> = (0..self.sample.len())
            .filter(|&i| {
                let (a, b) = &self.sample[i];
                let key = pair_key(&a.id, &b.id);
                !self.labeled.contains_key(&key) && !self.skipped.contains(&key)
            })
            .collect();

        let pick = match self.model.scorer() {
            None => open.first().copied(),
            Some(scorer) => open
                .par_iter()
                .map(|&i| {
                    let (a, b) = &self.sample[i];
                    ((scorer.score(&self.model.featurize(a, b)) - 0.5).abs(), i)
                })
                .min_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)))
                .map(|(_, i)| i),
        };
        pick.map(|i| self.sample[i].clone())
    }

    /// Ask `oracle` about uncertain pairs until it finishes or the sample
    /// runs out. Returns the number of match/distinct labels recorded.
    ///
    /// On cancellation the labels given so far are kept, the trainer goes
    /// back to `Sampling` and the cancellation error is returned.
    pub fn label(&mut self, oracle: &mut dyn LabelingOracle) -> Result<usize> {
        if self.sample.is_empty() {
            return Err(Error::config("no active sample: call sample() before label()"));
        }
        self.state = TrainerState::Labeling;
        let mut recorded = 0usize;
        let mut exhausted = true;

        while let Some((a, b)) = self.uncertain_pair() {
            let response = match oracle.label(&a, &b) {
                Ok(response) => response,
                Err(e) => {
                    self.state = TrainerState::Sampling;
                    tracing::info!(recorded, error = %e, "labeling stopped");
                    return Err(e);
                }
            };
            match response {
                LabelResponse::Match | LabelResponse::Distinct => {
                    let label = if response == LabelResponse::Match {
                        Label::Match
                    } else {
                        Label::Distinct
                    };
                    self.record_label(LabeledPair::new(a, b, label));
                    self.refit();
                    recorded += 1;
                }
                LabelResponse::Skip => {
                    self.skipped.insert(pair_key(&a.id, &b.id));
                }
                LabelResponse::Finished => {
                    exhausted = false;
                    break;
                }
            }
        }

        self.state = TrainerState::Sampling;
        let (matches, distincts) = self.label_counts();
        if exhausted {
            tracing::info!(recorded, "sample exhausted during labeling");
        }
        if matches == 0 || distincts == 0 {
            tracing::warn!(
                matches,
                distincts,
                "labeling ended without at least one match and one distinct example"
            );
        } else {
            tracing::info!(recorded, matches, distincts, "labeling finished");
        }
        Ok(recorded)
    }

    /// Fit the scorer and learn blocking predicates from the labeled corpus
    pub fn train(&mut self, options: &TrainOptions) -> Result<(TrainedModel, TrainReport)> {
        options.validate()?;
        let (matches, distincts) = self.label_counts();
        if matches == 0 || distincts == 0 {
            return Err(Error::InsufficientTrainingData { matches, distincts });
        }

        let scorer = self.fit()?;
        self.model.set_scorer(scorer.clone())?;

        let dupes: Vec<&LabeledPair> = self.labeled.values().filter(|p| p.label == Label::Match).collect();
        let dupe_keys: AHashSet<(RecordId, RecordId)> = dupes.iter().map(|p| p.key()).collect();
        // Collisions are estimated on sampled pairs not known to be duplicates
        let negatives: Vec<&Pair> = self
            .sample
            .iter()
            .filter(|(a, b)| !dupe_keys.contains(&pair_key(&a.id, &b.id)))
            .collect();
        let catalogue = self.catalogue(options);
        let catalogue_len = catalogue.len();

        let candidates: Vec<CoverCandidate> = catalogue
            .into_par_iter()
            .map(|predicate| {
                let covered: BTreeSet<usize> = dupes
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| predicate.covers(&p.a, &p.b))
                    .map(|(i, _)| i)
                    .collect();
                let collisions = negatives.iter().filter(|(a, b)| predicate.covers(a, b)).count();
                CoverCandidate {
                    predicate,
                    covered,
                    collisions,
                }
            })
            .collect();

        let covering: Vec<CoverCandidate> = candidates
            .into_iter()
            .filter(|c| c.covered.len() >= options.min_predicate_coverage)
            .collect();
        let candidates = filter_by_pair_fraction(covering, negatives.len(), options.max_pair_fraction);
        tracing::debug!(
            catalogue = catalogue_len,
            negatives = negatives.len(),
            kept = candidates.len(),
            "filtered predicate catalogue"
        );

        let cover = greedy_cover(candidates, dupes.len(), options.uncovered_dupes, options.tie_break);
        let uncovered: Vec<(RecordId, RecordId)> = cover.uncovered.iter().map(|&i| dupes[i].key()).collect();
        if !uncovered.is_empty() {
            tracing::warn!(
                uncovered = uncovered.len(),
                total = dupes.len(),
                "some labeled duplicates are not covered by any blocking predicate"
            );
        }

        self.predicates = cover.chosen.clone();
        let model = TrainedModel::new(
            self.model.schema().clone(),
            scorer,
            cover.chosen.clone(),
            DEFAULT_THRESHOLD,
        )?;
        self.state = TrainerState::Trained;

        tracing::info!(
            matches,
            distincts,
            predicates = cover.chosen.len(),
            uncovered = uncovered.len(),
            "training complete"
        );

        Ok((
            model,
            TrainReport {
                matches,
                distincts,
                predicates: cover.chosen,
                uncovered,
            },
        ))
    }

    fn record_label(&mut self, pair: LabeledPair) {
        let key = pair.key();
        match self.labeled.get(&key) {
            Some(existing) if existing.label == pair.label => {}
            Some(existing) => {
                tracing::warn!(
                    left = %key.0,
                    right = %key.1,
                    old = ?existing.label,
                    new = ?pair.label,
                    "conflicting label, keeping the newer one"
                );
                self.labeled.insert(key, pair);
            }
            None => {
                self.skipped.remove(&key);
                self.labeled.insert(key, pair);
            }
        }
    }

    fn fit(&self) -> Result<linkx_similarity::Scorer> {
        let pairs: Vec<Pair> = self
            .labeled
            .values()
            .map(|p| (Arc::clone(&p.a), Arc::clone(&p.b)))
            .collect();
        let labels: Vec<bool> = self.labeled.values().map(|p| p.label == Label::Match).collect();
        let features = self.model.featurize_pairs(&pairs);
        let has_missing: Vec<bool> = self.model.schema().specs().iter().map(|s| s.has_missing).collect();
        self.learner.fit(&features, &labels, &has_missing)
    }

    /// Refit after new labels so uncertainty reflects them
    fn refit(&mut self) {
        let (matches, distincts) = self.label_counts();
        if matches == 0 || distincts == 0 {
            return;
        }
        match self.fit().and_then(|scorer| self.model.set_scorer(scorer)) {
            Ok(()) => tracing::debug!(matches, distincts, "refitted scorer"),
            Err(e) => tracing::debug!(error = %e, "refit skipped"),
        }
    }

    fn catalogue(&self, options: &TrainOptions) -> Vec<Predicate> {
        let reference: Vec<Arc<Record>> = match self.mode {
            Mode::Link if !self.records_b.is_empty() => self.records_b.clone(),
            _ if !self.records_a.is_empty() => self.records_a.clone(),
            _ => self
                .labeled
                .values()
                .flat_map(|p| [Arc::clone(&p.a), Arc::clone(&p.b)])
                .collect(),
        };

        let mut catalogue = Vec::new();
        for field in self.model.schema().record_fields() {
            for kind in PredicateKind::simple() {
                catalogue.push(Predicate::new(field, kind));
            }
            if options.use_index_predicates {
                catalogue.push(Predicate::indexed_tokens(field, &reference, options.index_max_df));
            }
        }
        catalogue
    }
}

/// Keep predicates blocking together at most `max_fraction` of the
/// `negatives` non-duplicate sampled pairs. When none qualifies, the
/// covering predicate with the fewest collisions is kept so blocking never
/// comes back empty.
fn filter_by_pair_fraction(
    candidates: Vec<CoverCandidate>,
    negatives: usize,
    max_fraction: f64,
) -> Vec<CoverCandidate> {
    if negatives == 0 {
        return candidates;
    }
    let (kept, dropped): (Vec<CoverCandidate>, Vec<CoverCandidate>) = candidates
        .into_iter()
        .partition(|c| c.collisions as f64 / negatives as f64 <= max_fraction);
    if !kept.is_empty() {
        return kept;
    }

    let mut fallback: Option<CoverCandidate> = None;
    for candidate in dropped {
        if fallback.as_ref().map_or(true, |best| candidate.collisions < best.collisions) {
            fallback = Some(candidate);
        }
    }
    if let Some(c) = &fallback {
        tracing::warn!(
            predicate = %c.predicate,
            collisions = c.collisions,
            negatives,
            "no predicate within max_pair_fraction, keeping the most selective one"
        );
    }
    fallback.into_iter().collect()
}

/// Half blocked pairs (when there are any), the rest random
fn mix_samples<F>(blocked: &[(usize, usize)], n: usize, rng: &mut StdRng, random: F) -> Vec<(usize, usize)>
where
    F: Fn(usize, &mut StdRng) -> Vec<(usize, usize)>,
{
    if blocked.is_empty() {
        return random(n, rng);
    }
    let mut picked = sample_from(blocked, n / 2, rng);
    let taken: AHashSet<(usize, usize)> = picked.iter().copied().collect();
    let rest = n - picked.len();
    let extra: Vec<(usize, usize)> = random(rest + taken.len(), rng)
        .into_iter()
        .filter(|p| !taken.contains(p))
        .take(rest)
        .collect();
    picked.extend(extra);
    picked.sort_unstable();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::PrelabeledOracle;
    use linkx_core::FieldValue;
    use linkx_schema::{ComparatorRegistry, FieldDeclaration};

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![FieldDeclaration::string("address")], &ComparatorRegistry::new()).unwrap()
    }

    fn set(prefix: &str, values: &[&str]) -> RecordSet {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Record::from_pairs(
                    RecordId::tagged(prefix, i as u64),
                    [("address", FieldValue::from(*v))],
                )
            })
            .collect()
    }

    fn canonical() -> RecordSet {
        set(
            "canonical",
            &["100 main st", "200 oak ave", "300 elm st", "400 pine rd", "500 lake shore dr"],
        )
    }

    fn messy() -> RecordSet {
        set(
            "messy",
            &["100 main street", "200 oak avenue", "300 elm", "401 pine road", "500 lake shore drive"],
        )
    }

    /// Same row number means same entity
    fn truth_oracle() -> impl FnMut(&Record, &Record) -> Result<LabelResponse> {
        |a: &Record, b: &Record| {
            let same = match (&a.id, &b.id) {
                (RecordId::Tagged(_, x), RecordId::Tagged(_, y)) => x == y,
                _ => false,
            };
            Ok(if same {
                LabelResponse::Match
            } else {
                LabelResponse::Distinct
            })
        }
    }

    #[test]
    fn test_sample_is_deterministic() {
        let mut one = Trainer::new(schema()).with_seed(42);
        let mut two = Trainer::new(schema()).with_seed(42);
        one.sample(&messy(), &canonical(), 10).unwrap();
        two.sample(&messy(), &canonical(), 10).unwrap();
        let ids = |t: &Trainer| -> Vec<_> {
            t.sample_pairs().iter().map(|(a, b)| (a.id.clone(), b.id.clone())).collect()
        };
        assert_eq!(ids(&one), ids(&two));
        assert_eq!(one.sample_pairs().len(), 10);
        assert_eq!(one.state(), TrainerState::Sampling);
    }

    #[test]
    fn test_mark_pairs_conflict_overwrites() {
        let m = messy();
        let c = canonical();
        let a = m.iter().next().unwrap().clone();
        let b = c.iter().next().unwrap().clone();
        let mut trainer = Trainer::new(schema());
        trainer
            .mark_pairs(vec![LabeledPair::new(a.clone(), b.clone(), Label::Match)])
            .unwrap();
        trainer
            .mark_pairs(vec![LabeledPair::new(b.clone(), a.clone(), Label::Match)])
            .unwrap();
        assert_eq!(trainer.label_counts(), (1, 0));
        trainer
            .mark_pairs(vec![LabeledPair::new(a, b, Label::Distinct)])
            .unwrap();
        assert_eq!(trainer.label_counts(), (0, 1));
    }

    #[test]
    fn test_all_distinct_is_insufficient() {
        let mut trainer = Trainer::new(schema()).with_seed(1);
        trainer.sample(&messy(), &canonical(), 25).unwrap();
        let mut oracle = PrelabeledOracle::new().with_unknown(Label::Distinct);
        trainer.label(&mut oracle).unwrap();
        assert_eq!(trainer.state(), TrainerState::Sampling);
        assert!(matches!(
            trainer.train(&TrainOptions::default()),
            Err(Error::InsufficientTrainingData { matches: 0, .. })
        ));
    }

    #[test]
    fn test_cancellation_keeps_labels() {
        let mut trainer = Trainer::new(schema()).with_seed(3);
        trainer.sample(&messy(), &canonical(), 25).unwrap();
        let mut asked = 0;
        let mut oracle = |_: &Record, _: &Record| -> Result<LabelResponse> {
            asked += 1;
            if asked > 2 {
                Err(Error::LabelingCancelled)
            } else {
                Ok(LabelResponse::Distinct)
            }
        };
        let result = trainer.label(&mut oracle);
        assert!(matches!(result, Err(Error::LabelingCancelled)));
        assert_eq!(trainer.state(), TrainerState::Sampling);
        assert_eq!(trainer.label_counts(), (0, 2));
    }

    #[test]
    fn test_finished_and_skip() {
        let mut trainer = Trainer::new(schema()).with_seed(3);
        trainer.sample(&messy(), &canonical(), 25).unwrap();
        let mut answers = vec![LabelResponse::Finished, LabelResponse::Skip];
        let mut oracle = |_: &Record, _: &Record| -> Result<LabelResponse> {
            Ok(answers.pop().unwrap_or(LabelResponse::Finished))
        };
        assert_eq!(trainer.label(&mut oracle).unwrap(), 0);
        assert_eq!(trainer.label_counts(), (0, 0));
    }

    #[test]
    fn test_labeling_exhausts_sample() {
        let mut trainer = Trainer::new(schema()).with_seed(5);
        trainer.sample(&messy(), &canonical(), 25).unwrap();
        assert!(trainer.uncertain_pair().is_some());
        trainer.label(&mut truth_oracle()).unwrap();
        // every sampled pair is labeled now
        assert!(trainer.uncertain_pair().is_none());
        let (matches, distincts) = trainer.label_counts();
        assert_eq!(matches, 5);
        assert_eq!(distincts, 20);
    }

    #[test]
    fn test_train_learns_covering_predicates() {
        let mut trainer = Trainer::new(schema()).with_seed(11);
        trainer.sample(&messy(), &canonical(), 25).unwrap();
        trainer.label(&mut truth_oracle()).unwrap();

        let options = TrainOptions::default().with_max_pair_fraction(1.0);
        let (model, report) = trainer.train(&options).unwrap();
        assert_eq!(trainer.state(), TrainerState::Trained);
        assert_eq!(report.matches, 5);
        assert!(report.uncovered.is_empty());
        assert!(!model.predicates().is_empty());
        assert_eq!(model.threshold(), DEFAULT_THRESHOLD);

        let m = messy();
        let c = canonical();
        let a = m.get(&RecordId::tagged("messy", 0)).unwrap();
        let b = c.get(&RecordId::tagged("canonical", 0)).unwrap();
        let z = c.get(&RecordId::tagged("canonical", 3)).unwrap();
        assert!(model.score_pair(a, b) > model.score_pair(a, z));
    }

    #[test]
    fn test_budget_allows_uncovered() {
        let mut trainer = Trainer::new(schema()).with_seed(11);
        trainer.sample(&messy(), &canonical(), 25).unwrap();
        trainer.label(&mut truth_oracle()).unwrap();
        let options = TrainOptions::default()
            .with_max_pair_fraction(1.0)
            .with_uncovered_dupes(5);
        let (model, report) = trainer.train(&options).unwrap();
        assert!(model.predicates().is_empty());
        assert_eq!(report.uncovered.len(), 5);
    }

    fn street_schema() -> FieldSchema {
        FieldSchema::new(
            vec![FieldDeclaration::exact("number"), FieldDeclaration::string("street")],
            &ComparatorRegistry::new(),
        )
        .unwrap()
    }

    fn address(id: &str, number: &str, street: &str) -> Arc<Record> {
        Arc::new(Record::from_pairs(
            RecordId::from(id),
            [("number", FieldValue::from(number)), ("street", FieldValue::from(street))],
        ))
    }

    #[test]
    fn test_labeled_match_is_not_a_collision() {
        let m1 = address("m1", "100", "main street");
        let c1 = address("c1", "100", "main st");
        let c2 = address("c2", "200", "oak ave");
        let queries: RecordSet = std::iter::once((*m1).clone()).collect();
        let reference: RecordSet = std::iter::once((*c1).clone()).collect();

        // the only sampled pair is the labeled duplicate itself
        let mut trainer = Trainer::new(street_schema()).with_seed(1);
        assert_eq!(trainer.sample(&queries, &reference, 10).unwrap(), 1);
        trainer
            .mark_pairs(vec![
                LabeledPair::new(Arc::clone(&m1), Arc::clone(&c1), Label::Match),
                LabeledPair::new(Arc::clone(&m1), c2, Label::Distinct),
            ])
            .unwrap();

        let (model, report) = trainer.train(&TrainOptions::default()).unwrap();
        assert!(report.uncovered.is_empty());
        assert!(!model.predicates().is_empty());
        assert!(model.predicates().iter().any(|p| p.covers(&m1, &c1)));
        assert!(model.score_pair(&m1, &c1) > model.threshold());
    }

    #[test]
    fn test_keeps_most_selective_predicate_when_all_collide() {
        let m0 = Arc::new(Record::from_pairs(RecordId::tagged("messy", 0), [("address", "100 main st")]));
        let queries: RecordSet = std::iter::once((*m0).clone()).collect();
        let reference = set("canonical", &["100 main st", "100 main st"]);
        let c0 = reference.get(&RecordId::tagged("canonical", 0)).unwrap().clone();
        let c1 = reference.get(&RecordId::tagged("canonical", 1)).unwrap().clone();

        let mut trainer = Trainer::new(schema()).with_seed(1);
        trainer.sample(&queries, &reference, 10).unwrap();
        trainer
            .mark_pairs(vec![
                LabeledPair::new(Arc::clone(&m0), c0, Label::Match),
                LabeledPair::new(m0, c1, Label::Distinct),
            ])
            .unwrap();

        // the distinct pair shares every key, so no predicate is under the limit
        let (model, report) = trainer.train(&TrainOptions::default()).unwrap();
        assert!(report.uncovered.is_empty());
        assert_eq!(
            model.predicates(),
            &[Predicate::new("address", PredicateKind::WholeField)]
        );
    }

    #[test]
    fn test_seed_exact_matches() {
        let mut trainer = Trainer::new(schema()).with_seed(2);
        trainer.sample(&messy(), &canonical(), 4).unwrap();
        assert_eq!(trainer.seed_exact_matches(10).unwrap(), 4);
        let (matches, _) = trainer.label_counts();
        assert!(matches >= 1);
        assert!(trainer.labeled_pairs().all(|p| p.a.id == p.b.id));
    }

    #[test]
    fn test_mark_pairs_by_id_skips_unknown() {
        let m = messy();
        let c = canonical();
        let mut trainer = Trainer::new(schema());
        let marked = trainer
            .mark_pairs_by_id(
                &[
                    (RecordId::tagged("messy", 0), RecordId::tagged("canonical", 0), Label::Match),
                    (RecordId::tagged("messy", 9), RecordId::tagged("canonical", 0), Label::Match),
                ],
                &[&m, &c],
            )
            .unwrap();
        assert_eq!(marked, 1);
    }

    #[test]
    fn test_resample_uses_predicates() {
        let mut trainer = Trainer::new(schema()).with_seed(11);
        trainer.sample(&messy(), &canonical(), 25).unwrap();
        trainer.label(&mut truth_oracle()).unwrap();
        let options = TrainOptions::default().with_max_pair_fraction(1.0);
        trainer.train(&options).unwrap();

        trainer.sample(&messy(), &canonical(), 6).unwrap();
        assert_eq!(trainer.sample_pairs().len(), 6);
        assert_eq!(trainer.state(), TrainerState::Sampling);
    }
}
