use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::Result;

/// Stable identifier of a record.
///
/// `Tagged` is the composite form used when several inputs are loaded into
/// one process: a namespace (usually the source name) plus a row number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Integer(u64),
    String(String),
    Tagged(String, u64),
}

impl RecordId {
    #[inline]
    #[must_use]
    pub fn tagged<S: Into<String>>(namespace: S, seq: u64) -> Self {
        RecordId::Tagged(namespace.into(), seq)
    }

    /// Namespace of a tagged ID, if any
    pub fn namespace(&self) -> Option<&str> {
        match self {
            RecordId::Tagged(ns, _) => Some(ns),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Integer(i) => write!(f, "{}", i),
            RecordId::String(s) => write!(f, "{}", s),
            RecordId::Tagged(ns, seq) => write!(f, "{}:{}", ns, seq),
        }
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::String(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::String(s.to_string())
    }
}

impl From<u64> for RecordId {
    fn from(i: u64) -> Self {
        RecordId::Integer(i)
    }
}

/// A normalized field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Number(f64),
    Text(String),
    Set(Vec<String>),
}

impl FieldValue {
    /// Null, blank text and empty sets all count as missing
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Number(n) => n.is_nan(),
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Set(items) => items.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Render the value as text for string comparators and blocking keys.
    /// Sets are joined with single spaces.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            FieldValue::Text(s) => s.clone(),
            FieldValue::Set(items) => items.join(" "),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::Set(items)
    }
}

/// An immutable record: an ID plus normalized field values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    #[inline]
    #[must_use]
    pub fn new(id: RecordId, fields: BTreeMap<String, FieldValue>) -> Self {
        Self { id, fields }
    }

    /// Build a record from `(name, value)` pairs
    pub fn from_pairs<I, K, V>(id: RecordId, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { id, fields }
    }

    /// Field value, or `None` when the field is absent or missing
    #[inline]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).filter(|v| !v.is_missing())
    }

    #[inline]
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }
}

/// A set of records keyed and iterated by ID
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: BTreeMap<RecordId, Arc<Record>>,
}

impl RecordSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; a record with the same ID is replaced
    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.id.clone(), Arc::new(record));
    }

    pub fn remove(&mut self, id: &RecordId) -> Option<Arc<Record>> {
        self.records.remove(id)
    }

    #[inline]
    pub fn get(&self, id: &RecordId) -> Option<&Arc<Record>> {
        self.records.get(id)
    }

    #[inline]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending ID order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.records.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.keys()
    }

    /// Records as a vector, in ascending ID order
    pub fn to_vec(&self) -> Vec<Arc<Record>> {
        self.records.values().cloned().collect()
    }

    /// Load every record a source yields
    pub fn from_source(source: &dyn RecordSource) -> Result<Self> {
        Ok(source.records()?.into_iter().collect())
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

/// Anything that can hand the pipeline a batch of normalized records
pub trait RecordSource {
    fn records(&self) -> Result<Vec<Record>>;
}

impl RecordSource for Vec<Record> {
    fn records(&self) -> Result<Vec<Record>> {
        Ok(self.clone())
    }
}
