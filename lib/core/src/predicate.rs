//! Blocking predicates.
//!
//! A predicate maps a record to zero or more blocking keys using only that
//! record's field values. Two records can only be compared by the matcher if
//! they share a key under at least one active predicate.

use ahash::AHashMap;
use rphonetic::{DoubleMetaphone, Encoder};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

use crate::record::Record;

/// Blocking keys produced by one predicate for one record (sorted, unique)
pub type Keys = SmallVec<[String; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateKind {
    /// The full normalized value
    WholeField,
    /// First whitespace-delimited token
    FirstToken,
    /// First `n` characters
    Prefix(usize),
    /// Every token
    Tokens,
    /// Every run of ASCII digits
    Integers,
    /// Double Metaphone code of every alphabetic token
    Metaphone,
    /// Every token except the frozen stop list.
    ///
    /// The stop list is computed from token frequencies at training time and
    /// stored with the predicate, so key generation stays record-local.
    IndexedTokens { stop: Vec<String> },
}

impl PredicateKind {
    /// Kinds that need no corpus statistics
    pub fn simple() -> Vec<PredicateKind> {
        vec![
            PredicateKind::WholeField,
            PredicateKind::FirstToken,
            PredicateKind::Prefix(3),
            PredicateKind::Prefix(5),
            PredicateKind::Tokens,
            PredicateKind::Integers,
            PredicateKind::Metaphone,
        ]
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PredicateKind::IndexedTokens { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub kind: PredicateKind,
}

impl Predicate {
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>>(field: S, kind: PredicateKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    /// Index predicate for `field` whose stop list holds every token that
    /// appears in more than `max_df` (fraction) of `records`.
    pub fn indexed_tokens<S: Into<String>>(field: S, records: &[Arc<Record>], max_df: f64) -> Self {
        let field = field.into();
        let mut df: AHashMap<String, usize> = AHashMap::new();
        let mut docs = 0usize;
        for record in records {
            let Some(value) = record.get(&field) else {
                continue;
            };
            docs += 1;
            let mut seen = tokenize(&value.to_text());
            seen.sort();
            seen.dedup();
            for token in seen {
                *df.entry(token).or_insert(0) += 1;
            }
        }

        let limit = (docs as f64 * max_df).floor() as usize;
        let mut stop: Vec<String> = df
            .into_iter()
            .filter(|(_, count)| docs > 1 && *count > limit)
            .map(|(token, _)| token)
            .collect();
        stop.sort();

        tracing::debug!(field = %field, docs, stop_words = stop.len(), "computed index predicate stop list");
        Self::new(field, PredicateKind::IndexedTokens { stop })
    }

    /// Blocking keys of `record`; empty when the field is missing
    pub fn keys(&self, record: &Record) -> Keys {
        let Some(value) = record.get(&self.field) else {
            return Keys::new();
        };
        let text = value.to_text().trim().to_lowercase();
        if text.is_empty() {
            return Keys::new();
        }

        let mut keys: Keys = match &self.kind {
            PredicateKind::WholeField => smallvec::smallvec![text],
            PredicateKind::FirstToken => tokenize(&text).into_iter().take(1).collect(),
            PredicateKind::Prefix(n) => {
                if *n == 0 {
                    Keys::new()
                } else {
                    smallvec::smallvec![text.chars().take(*n).collect::<String>()]
                }
            }
            PredicateKind::Tokens => tokenize(&text).into_iter().collect(),
            PredicateKind::Integers => integers(&text).into_iter().collect(),
            PredicateKind::Metaphone => tokenize(&text)
                .iter()
                .filter(|t| t.chars().any(|c| c.is_alphabetic()))
                .filter_map(|t| metaphone(t))
                .collect(),
            PredicateKind::IndexedTokens { stop } => tokenize(&text)
                .into_iter()
                .filter(|t| stop.binary_search(t).is_err())
                .collect(),
        };

        keys.sort();
        keys.dedup();
        keys
    }

    /// Whether two records share at least one key
    pub fn covers(&self, a: &Record, b: &Record) -> bool {
        let ka = self.keys(a);
        if ka.is_empty() {
            return false;
        }
        let kb = self.keys(b);
        ka.iter().any(|k| kb.binary_search(k).is_ok())
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            PredicateKind::WholeField => write!(f, "whole({})", self.field),
            PredicateKind::FirstToken => write!(f, "first_token({})", self.field),
            PredicateKind::Prefix(n) => write!(f, "prefix{}({})", n, self.field),
            PredicateKind::Tokens => write!(f, "tokens({})", self.field),
            PredicateKind::Integers => write!(f, "integers({})", self.field),
            PredicateKind::Metaphone => write!(f, "metaphone({})", self.field),
            PredicateKind::IndexedTokens { stop } => {
                write!(f, "indexed_tokens({}, stop={})", self.field, stop.len())
            }
        }
    }
}

/// Lowercase alphanumeric tokens
#[inline]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn integers(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let trimmed = s.trim_start_matches('0');
            if trimmed.is_empty() { "0" } else { trimmed }.to_string()
        })
        .collect()
}

fn metaphone(token: &str) -> Option<String> {
    // rphonetic can panic on unusual input
    let code = std::panic::catch_unwind(|| DoubleMetaphone::default().encode(token)).ok()?;
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}
