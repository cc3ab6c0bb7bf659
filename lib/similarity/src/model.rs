//! Pairwise featurization and scoring
//!
//! A [`SimilarityModel`] turns a record pair into a feature vector with one
//! slot per schema field, then maps that vector to a match probability with
//! a fitted [`Scorer`].

use linkx_core::{Error, Record, Result};
use linkx_schema::FieldSchema;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One slot per field spec, in declaration order. NaN marks a missing value.
pub type FeatureVector = Vec<f64>;

/// Fitted linear scoring function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorer {
    pub weights: Vec<f64>,
    /// Weight of the "slot is NaN" indicator; zero for fields without
    /// `has_missing`
    pub missing_weights: Vec<f64>,
    pub bias: f64,
}

impl Scorer {
    pub fn zeros(len: usize) -> Self {
        Self {
            weights: vec![0.0; len],
            missing_weights: vec![0.0; len],
            bias: 0.0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Linear term before the sigmoid
    pub fn logit(&self, features: &[f64]) -> f64 {
        let mut z = self.bias;
        for (i, x) in features.iter().enumerate() {
            if x.is_nan() {
                z += self.missing_weights.get(i).copied().unwrap_or(0.0);
            } else {
                z += self.weights.get(i).copied().unwrap_or(0.0) * x;
            }
        }
        z
    }

    /// Match probability in [0, 1]
    #[inline]
    pub fn score(&self, features: &[f64]) -> f64 {
        sigmoid(self.logit(features))
    }
}

#[inline]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Featurizer plus an optional fitted scorer
#[derive(Debug, Clone)]
pub struct SimilarityModel {
    schema: FieldSchema,
    scorer: Option<Scorer>,
}

impl SimilarityModel {
    pub fn new(schema: FieldSchema) -> Self {
        Self {
            schema,
            scorer: None,
        }
    }

    pub fn with_scorer(schema: FieldSchema, scorer: Scorer) -> Result<Self> {
        let mut model = Self::new(schema);
        model.set_scorer(scorer)?;
        Ok(model)
    }

    #[inline]
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    #[inline]
    pub fn scorer(&self) -> Option<&Scorer> {
        self.scorer.as_ref()
    }

    #[inline]
    pub fn is_trained(&self) -> bool {
        self.scorer.is_some()
    }

    /// Install a fitted scorer; its length must match the schema
    pub fn set_scorer(&mut self, scorer: Scorer) -> Result<()> {
        if scorer.weights.len() != self.schema.len() || scorer.missing_weights.len() != self.schema.len() {
            return Err(Error::config(format!(
                "scorer has {} weights, schema has {} fields",
                scorer.weights.len(),
                self.schema.len()
            )));
        }
        self.scorer = Some(scorer);
        Ok(())
    }

    /// Compare two records field by field.
    ///
    /// Interactions read slots computed earlier in the same pass.
    pub fn featurize(&self, a: &Record, b: &Record) -> FeatureVector {
        let specs = self.schema.specs();
        let mut features = Vec::with_capacity(specs.len());
        for (slot, spec) in specs.iter().enumerate() {
            let value = if spec.is_interaction() {
                interaction(&features, &spec.components)
            } else {
                self.schema.compare_field(slot, a, b)
            };
            features.push(value);
        }
        features
    }

    /// Featurize many pairs in parallel; output order matches input order
    pub fn featurize_pairs(&self, pairs: &[(Arc<Record>, Arc<Record>)]) -> Vec<FeatureVector> {
        pairs
            .par_iter()
            .map(|(a, b)| self.featurize(a, b))
            .collect()
    }

    pub fn score(&self, features: &[f64]) -> Result<f64> {
        let scorer = self.scorer.as_ref().ok_or(Error::NotTrained)?;
        Ok(scorer.score(features))
    }

    pub fn score_pair(&self, a: &Record, b: &Record) -> Result<f64> {
        let scorer = self.scorer.as_ref().ok_or(Error::NotTrained)?;
        Ok(scorer.score(&self.featurize(a, b)))
    }

    /// Score many pairs in parallel; output order matches input order
    pub fn score_pairs(&self, pairs: &[(Arc<Record>, Arc<Record>)]) -> Result<Vec<f64>> {
        let scorer = self.scorer.as_ref().ok_or(Error::NotTrained)?;
        Ok(pairs
            .par_iter()
            .map(|(a, b)| scorer.score(&self.featurize(a, b)))
            .collect())
    }
}

fn interaction(features: &[f64], components: &[usize]) -> f64 {
    let mut product = 1.0;
    for &c in components {
        let x = features.get(c).copied().unwrap_or(f64::NAN);
        if x.is_nan() || x == 0.0 {
            return 0.0;
        }
        product *= x;
    }
    product
}
