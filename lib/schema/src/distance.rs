//! Comparator functions for structured field comparison
//!
//! String comparators return a similarity in [0.0, 1.0] where 1.0 means
//! identical. Exact comparison returns 0.0 or 1.0.

use linkx_core::{tokenize, FieldValue};
use std::collections::HashSet;

use crate::schema::StringMetric;

/// Compare two present field values with a string metric
pub fn string_similarity(a: &FieldValue, b: &FieldValue, metric: StringMetric) -> f64 {
    let a = a.to_text().to_lowercase();
    let b = b.to_text().to_lowercase();
    match metric {
        StringMetric::JaroWinkler => strsim::jaro_winkler(&a, &b),
        StringMetric::Levenshtein => strsim::normalized_levenshtein(&a, &b),
        StringMetric::Trigram => trigram_similarity(&a, &b),
    }
}

/// 1.0 when both values are equal after normalization, 0.0 otherwise.
///
/// Numbers compare numerically, sets as unordered sets, everything else as
/// trimmed case-insensitive text.
pub fn exact(a: &FieldValue, b: &FieldValue) -> f64 {
    let equal = match (a, b) {
        (FieldValue::Number(x), FieldValue::Number(y)) => (x - y).abs() < f64::EPSILON,
        (FieldValue::Set(x), FieldValue::Set(y)) => {
            let x: HashSet<String> = x.iter().map(|s| s.to_lowercase()).collect();
            let y: HashSet<String> = y.iter().map(|s| s.to_lowercase()).collect();
            x == y
        }
        _ => a.to_text().trim().eq_ignore_ascii_case(b.to_text().trim()),
    };
    if equal {
        1.0
    } else {
        0.0
    }
}

/// Jaccard similarity between token sets.
///
/// `Set` values contribute their items; text values are tokenized.
pub fn token_set(a: &FieldValue, b: &FieldValue) -> f64 {
    let tokens_a = token_bag(a);
    let tokens_b = token_bag(b);

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn token_bag(value: &FieldValue) -> HashSet<String> {
    match value {
        FieldValue::Set(items) => items.iter().map(|s| s.trim().to_lowercase()).collect(),
        other => tokenize(&other.to_text()).into_iter().collect(),
    }
}

/// Character trigram similarity (Jaccard over padded trigrams)
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let trigrams_a = generate_trigrams(&a.to_lowercase());
    let trigrams_b = generate_trigrams(&b.to_lowercase());

    if trigrams_a.is_empty() && trigrams_b.is_empty() {
        return 1.0;
    }

    if trigrams_a.is_empty() || trigrams_b.is_empty() {
        return 0.0;
    }

    let intersection = trigrams_a.intersection(&trigrams_b).count();
    let union = trigrams_a.union(&trigrams_b).count();

    intersection as f64 / union as f64
}

fn generate_trigrams(s: &str) -> HashSet<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return HashSet::new();
    }
    let padded = format!("  {}  ", trimmed);
    let chars: Vec<char> = padded.chars().collect();

    chars.windows(3).map(|w| w.iter().collect::<String>()).collect()
}
