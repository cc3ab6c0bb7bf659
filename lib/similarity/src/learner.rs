//! Learners that fit a [`Scorer`] from labeled feature vectors

use linkx_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::model::{sigmoid, FeatureVector, Scorer};

/// Fits a scoring function.
///
/// `has_missing[i]` says whether slot `i` gets a learned missing-value
/// weight. Implementations must be deterministic for identical input.
pub trait Learner: Send + Sync {
    fn fit(&self, features: &[FeatureVector], labels: &[bool], has_missing: &[bool]) -> Result<Scorer>;
}

/// L2-regularized logistic regression trained with full-batch gradient
/// descent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// L2 penalty
    pub alpha: f64,
    pub learning_rate: f64,
    pub max_epochs: usize,
    /// Stop when the largest gradient component falls below this
    pub tolerance: f64,
    /// Reweight classes so matches and distincts contribute equally
    pub balanced: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            alpha: 0.001,
            learning_rate: 0.5,
            max_epochs: 2000,
            tolerance: 1e-6,
            balanced: true,
        }
    }
}

impl LogisticRegression {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn with_balanced(mut self, balanced: bool) -> Self {
        self.balanced = balanced;
        self
    }
}

impl Learner for LogisticRegression {
    fn fit(&self, features: &[FeatureVector], labels: &[bool], has_missing: &[bool]) -> Result<Scorer> {
        if features.len() != labels.len() {
            return Err(Error::config(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let matches = labels.iter().filter(|l| **l).count();
        let distincts = labels.len() - matches;
        if matches == 0 || distincts == 0 {
            return Err(Error::InsufficientTrainingData { matches, distincts });
        }

        let dim = has_missing.len();
        if let Some(bad) = features.iter().find(|f| f.len() != dim) {
            return Err(Error::config(format!(
                "feature vector has {} slots, expected {}",
                bad.len(),
                dim
            )));
        }

        let n = labels.len() as f64;
        let (w_pos, w_neg) = if self.balanced {
            (n / (2.0 * matches as f64), n / (2.0 * distincts as f64))
        } else {
            (1.0, 1.0)
        };

        let mut scorer = Scorer::zeros(dim);
        let mut grad_w = vec![0.0; dim];
        let mut grad_m = vec![0.0; dim];

        for epoch in 0..self.max_epochs {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            grad_m.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;

            for (x, &y) in features.iter().zip(labels) {
                let target = if y { 1.0 } else { 0.0 };
                let sample_weight = if y { w_pos } else { w_neg };
                let err = (sigmoid(scorer.logit(x)) - target) * sample_weight;
                for i in 0..dim {
                    if x[i].is_nan() {
                        if has_missing[i] {
                            grad_m[i] += err;
                        }
                    } else {
                        grad_w[i] += err * x[i];
                    }
                }
                grad_b += err;
            }

            let mut max_grad = (grad_b / n).abs();
            for i in 0..dim {
                let gw = grad_w[i] / n + self.alpha * scorer.weights[i];
                scorer.weights[i] -= self.learning_rate * gw;
                max_grad = max_grad.max(gw.abs());
                if has_missing[i] {
                    let gm = grad_m[i] / n + self.alpha * scorer.missing_weights[i];
                    scorer.missing_weights[i] -= self.learning_rate * gm;
                    max_grad = max_grad.max(gm.abs());
                }
            }
            scorer.bias -= self.learning_rate * grad_b / n;

            if max_grad < self.tolerance {
                tracing::debug!(epoch, "logistic regression converged");
                break;
            }
        }

        tracing::debug!(
            matches,
            distincts,
            bias = scorer.bias,
            weights = ?scorer.weights,
            "fitted logistic regression"
        );
        Ok(scorer)
    }
}
