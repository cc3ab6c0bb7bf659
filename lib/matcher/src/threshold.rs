//! Decision threshold selection

use linkx_core::{Error, Result};
use ordered_float::OrderedFloat;

/// Threshold used when there is nothing to learn it from
pub const FALLBACK_THRESHOLD: f64 = 0.5;

/// Pick the score threshold maximising the expected F-beta measure.
///
/// Each score is read as the probability that its pair is a true match.
/// Sweeping the scores in descending order, expected precision at the k-th
/// score is the mean of the top k scores and expected recall is their sum
/// over the total. `recall_weight` is beta: values above 1 favour recall.
pub fn select_threshold(scores: &[f64], recall_weight: f64) -> Result<f64> {
    if !(recall_weight.is_finite() && recall_weight > 0.0) {
        return Err(Error::config(format!(
            "recall_weight must be a positive number, got {}",
            recall_weight
        )));
    }

    let mut sorted: Vec<OrderedFloat<f64>> = scores
        .iter()
        .filter(|s| !s.is_nan())
        .map(|&s| OrderedFloat(s))
        .collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let total: f64 = sorted.iter().map(|s| s.0).sum();
    if sorted.is_empty() || total <= 0.0 {
        return Ok(FALLBACK_THRESHOLD);
    }

    let beta2 = recall_weight * recall_weight;
    let mut best = (f64::NEG_INFINITY, FALLBACK_THRESHOLD);
    let mut true_positives = 0.0;
    for (k, score) in sorted.iter().enumerate() {
        true_positives += score.0;
        let precision = true_positives / (k + 1) as f64;
        let recall = true_positives / total;
        let denom = beta2 * precision + recall;
        let f = if denom > 0.0 {
            (1.0 + beta2) * precision * recall / denom
        } else {
            0.0
        };
        if f > best.0 {
            best = (f, score.0);
        }
    }

    tracing::debug!(candidates = sorted.len(), threshold = best.1, f_beta = best.0, "selected threshold");
    Ok(best.1)
}
