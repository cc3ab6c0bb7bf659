use linkx_core::{Error, Predicate, Record, Result};
use linkx_schema::FieldSchema;

use crate::model::{FeatureVector, Scorer, SimilarityModel};

/// Default decision threshold of a freshly trained model
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Everything needed to block and score without the training corpus:
/// a schema, a fitted scorer, the learned predicates and a threshold.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    /// Always carries a scorer: `new` is the only constructor
    model: SimilarityModel,
    predicates: Vec<Predicate>,
    threshold: f64,
}

impl TrainedModel {
    pub fn new(schema: FieldSchema, scorer: Scorer, predicates: Vec<Predicate>, threshold: f64) -> Result<Self> {
        let model = SimilarityModel::with_scorer(schema, scorer)?;
        let mut trained = Self {
            model,
            predicates,
            threshold: DEFAULT_THRESHOLD,
        };
        trained.set_threshold(threshold)?;
        Ok(trained)
    }

    #[inline]
    pub fn similarity(&self) -> &SimilarityModel {
        &self.model
    }

    #[inline]
    pub fn schema(&self) -> &FieldSchema {
        self.model.schema()
    }

    #[inline]
    pub fn scorer(&self) -> Result<&Scorer> {
        self.model.scorer().ok_or(Error::NotTrained)
    }

    #[inline]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::config(format!("threshold {} outside [0, 1]", threshold)));
        }
        self.threshold = threshold;
        Ok(())
    }

    pub fn featurize(&self, a: &Record, b: &Record) -> FeatureVector {
        self.model.featurize(a, b)
    }

    pub fn score_pair(&self, a: &Record, b: &Record) -> f64 {
        match self.model.scorer() {
            Some(scorer) => scorer.score(&self.model.featurize(a, b)),
            None => f64::NAN,
        }
    }
}
