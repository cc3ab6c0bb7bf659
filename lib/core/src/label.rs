use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::record::{Record, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Match,
    Distinct,
}

/// A pair of records with a human (or oracle) judgement
#[derive(Debug, Clone)]
pub struct LabeledPair {
    pub a: Arc<Record>,
    pub b: Arc<Record>,
    pub label: Label,
}

impl LabeledPair {
    pub fn new(a: Arc<Record>, b: Arc<Record>, label: Label) -> Self {
        Self { a, b, label }
    }

    /// Ordered ID pair identifying this pair regardless of argument order
    pub fn key(&self) -> (RecordId, RecordId) {
        pair_key(&self.a.id, &self.b.id)
    }
}

#[inline]
pub fn pair_key(x: &RecordId, y: &RecordId) -> (RecordId, RecordId) {
    if x <= y {
        (x.clone(), y.clone())
    } else {
        (y.clone(), x.clone())
    }
}
