//! Field schema definitions
//!
//! Declares which fields are compared, with which comparator, and in which
//! order. The declaration order is the feature order used everywhere else.

use linkx_core::{Error, FieldValue, Record, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::distance;
use crate::registry::{ComparatorRegistry, CustomComparator};

/// String similarity metric
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StringMetric {
    #[default]
    JaroWinkler,
    Levenshtein,
    Trigram,
}

/// How a field is compared
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// 1.0 if equal, 0.0 otherwise
    Exact,
    /// Fuzzy string similarity in [0, 1]
    String(StringMetric),
    /// Jaccard similarity of token sets
    TokenSet,
    /// A comparator registered by name in a [`ComparatorRegistry`]
    Custom(String),
    /// Product of previously declared fields
    Interaction(Vec<String>),
}

/// One entry of the user-facing declaration list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDeclaration {
    pub name: String,
    pub comparator: Comparator,
    /// Learn a separate weight for "this field is missing"
    #[serde(default)]
    pub has_missing: bool,
}

impl FieldDeclaration {
    pub fn new<S: Into<String>>(name: S, comparator: Comparator) -> Self {
        Self {
            name: name.into(),
            comparator,
            has_missing: false,
        }
    }

    /// Jaro-Winkler string field
    pub fn string<S: Into<String>>(name: S) -> Self {
        Self::new(name, Comparator::String(StringMetric::JaroWinkler))
    }

    pub fn exact<S: Into<String>>(name: S) -> Self {
        Self::new(name, Comparator::Exact)
    }

    pub fn token_set<S: Into<String>>(name: S) -> Self {
        Self::new(name, Comparator::TokenSet)
    }

    pub fn custom<S: Into<String>, C: Into<String>>(name: S, comparator: C) -> Self {
        Self::new(name, Comparator::Custom(comparator.into()))
    }

    pub fn interaction<S: Into<String>>(name: S, components: &[&str]) -> Self {
        Self::new(
            name,
            Comparator::Interaction(components.iter().map(|c| c.to_string()).collect()),
        )
    }

    pub fn with_missing(mut self) -> Self {
        self.has_missing = true;
        self
    }
}

/// Capability of comparing one field of two records
pub trait FieldComparator {
    /// Similarity of the two values, NaN when either side is missing or the
    /// values cannot be compared
    fn compare(&self, a: Option<&FieldValue>, b: Option<&FieldValue>) -> f64;
}

/// A validated, resolved field ready for featurization
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub comparator: Comparator,
    pub has_missing: bool,
    /// Feature slots read by an interaction, all lower than this spec's slot
    pub components: Vec<usize>,
    custom: Option<CustomComparator>,
}

impl FieldSpec {
    #[inline]
    pub fn is_interaction(&self) -> bool {
        matches!(self.comparator, Comparator::Interaction(_))
    }
}

impl FieldComparator for FieldSpec {
    fn compare(&self, a: Option<&FieldValue>, b: Option<&FieldValue>) -> f64 {
        let (Some(a), Some(b)) = (a, b) else {
            return f64::NAN;
        };
        match &self.comparator {
            Comparator::Exact => distance::exact(a, b),
            Comparator::String(metric) => distance::string_similarity(a, b, *metric),
            Comparator::TokenSet => distance::token_set(a, b),
            Comparator::Custom(_) => match self.custom {
                Some(f) => f(a, b),
                None => f64::NAN,
            },
            // Interactions are computed from earlier feature slots
            Comparator::Interaction(_) => f64::NAN,
        }
    }
}

/// Ordered, validated field schema
#[derive(Debug, Clone)]
pub struct FieldSchema {
    declarations: Vec<FieldDeclaration>,
    specs: Vec<FieldSpec>,
    fingerprint: String,
}

impl FieldSchema {
    /// Validate and resolve a declaration list.
    ///
    /// Rejects an empty list, duplicate names, interactions with fewer than
    /// two components or referencing a field not declared before them, and
    /// custom comparators missing from `registry`.
    pub fn new(declarations: Vec<FieldDeclaration>, registry: &ComparatorRegistry) -> Result<Self> {
        if declarations.is_empty() {
            return Err(Error::config("field schema must declare at least one field"));
        }

        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut specs = Vec::with_capacity(declarations.len());

        for (slot, decl) in declarations.iter().enumerate() {
            if decl.name.trim().is_empty() {
                return Err(Error::config(format!("field #{} has an empty name", slot)));
            }
            if slots.contains_key(decl.name.as_str()) {
                return Err(Error::config(format!("duplicate field name '{}'", decl.name)));
            }

            let mut components = Vec::new();
            let mut custom = None;
            match &decl.comparator {
                Comparator::Interaction(names) => {
                    if names.len() < 2 {
                        return Err(Error::config(format!(
                            "interaction '{}' needs at least two components",
                            decl.name
                        )));
                    }
                    for name in names {
                        let idx = slots.get(name.as_str()).copied().ok_or_else(|| {
                            Error::config(format!(
                                "interaction '{}' references '{}', which is not declared before it",
                                decl.name, name
                            ))
                        })?;
                        components.push(idx);
                    }
                }
                Comparator::Custom(name) => {
                    custom = Some(registry.get(name).ok_or_else(|| {
                        Error::config(format!(
                            "field '{}' uses unregistered comparator '{}'",
                            decl.name, name
                        ))
                    })?);
                }
                _ => {}
            }

            slots.insert(decl.name.as_str(), slot);
            specs.push(FieldSpec {
                name: decl.name.clone(),
                comparator: decl.comparator.clone(),
                has_missing: decl.has_missing,
                components,
                custom,
            });
        }

        let canonical = serde_json::to_vec(&declarations)?;
        let fingerprint = format!("{:x}", Sha256::digest(&canonical));

        tracing::debug!(fields = specs.len(), fingerprint = %fingerprint, "field schema resolved");

        Ok(Self {
            declarations,
            specs,
            fingerprint,
        })
    }

    /// Specs in declaration (feature) order
    #[inline]
    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    #[inline]
    pub fn declarations(&self) -> &[FieldDeclaration] {
        &self.declarations
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    /// SHA-256 identity of the canonical declaration list
    #[inline]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Names of fields read directly from records (not interactions)
    pub fn record_fields(&self) -> Vec<&str> {
        self.specs
            .iter()
            .filter(|s| !s.is_interaction())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Compare one field of two records
    pub fn compare_field(&self, slot: usize, a: &Record, b: &Record) -> f64 {
        let spec = &self.specs[slot];
        spec.compare(a.get(&spec.name), b.get(&spec.name))
    }
}
