use ahash::AHashMap;
use linkx_core::{pair_key, Label, Record, RecordId, Result};

/// Answer to a single labeling question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelResponse {
    Match,
    Distinct,
    /// Unsure; the pair is not asked again
    Skip,
    /// Stop labeling for now
    Finished,
}

impl From<Label> for LabelResponse {
    fn from(label: Label) -> Self {
        match label {
            Label::Match => LabelResponse::Match,
            Label::Distinct => LabelResponse::Distinct,
        }
    }
}

/// Synchronous source of labels, usually a human at a prompt.
///
/// Returning `Err(Error::LabelingCancelled)` aborts the labeling loop.
pub trait LabelingOracle {
    fn label(&mut self, a: &Record, b: &Record) -> Result<LabelResponse>;
}

impl<F> LabelingOracle for F
where
    F: FnMut(&Record, &Record) -> Result<LabelResponse>,
{
    fn label(&mut self, a: &Record, b: &Record) -> Result<LabelResponse> {
        self(a, b)
    }
}

/// Oracle answering from a lookup table of known pairs
#[derive(Debug, Clone, Default)]
pub struct PrelabeledOracle {
    labels: AHashMap<(RecordId, RecordId), Label>,
    unknown: Option<Label>,
    budget: Option<usize>,
    answered: usize,
}

impl PrelabeledOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, a: RecordId, b: RecordId, label: Label) {
        self.labels.insert(pair_key(&a, &b), label);
    }

    pub fn with(mut self, a: RecordId, b: RecordId, label: Label) -> Self {
        self.insert(a, b, label);
        self
    }

    /// Label for pairs missing from the table; by default they are skipped
    pub fn with_unknown(mut self, label: Label) -> Self {
        self.unknown = Some(label);
        self
    }

    /// Answer `Finished` after this many match/distinct answers
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn answered(&self) -> usize {
        self.answered
    }
}

impl LabelingOracle for PrelabeledOracle {
    fn label(&mut self, a: &Record, b: &Record) -> Result<LabelResponse> {
        if self.budget.is_some_and(|budget| self.answered >= budget) {
            return Ok(LabelResponse::Finished);
        }
        let label = self.labels.get(&pair_key(&a.id, &b.id)).copied().or(self.unknown);
        Ok(match label {
            Some(label) => {
                self.answered += 1;
                label.into()
            }
            None => LabelResponse::Skip,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkx_core::Error;

    fn rec(id: &str) -> Record {
        Record::from_pairs(RecordId::from(id), [("name", id)])
    }

    #[test]
    fn test_prelabeled_lookup_is_symmetric() {
        let mut oracle = PrelabeledOracle::new().with("b".into(), "a".into(), Label::Match);
        assert_eq!(oracle.label(&rec("a"), &rec("b")).unwrap(), LabelResponse::Match);
        assert_eq!(oracle.label(&rec("a"), &rec("c")).unwrap(), LabelResponse::Skip);
    }

    #[test]
    fn test_budget_finishes() {
        let mut oracle = PrelabeledOracle::new()
            .with_unknown(Label::Distinct)
            .with_budget(1);
        assert_eq!(oracle.label(&rec("a"), &rec("b")).unwrap(), LabelResponse::Distinct);
        assert_eq!(oracle.label(&rec("a"), &rec("c")).unwrap(), LabelResponse::Finished);
        assert_eq!(oracle.answered(), 1);
    }

    #[test]
    fn test_closure_oracle() {
        let mut calls = 0;
        let mut oracle = |_: &Record, _: &Record| -> Result<LabelResponse> {
            calls += 1;
            Err(Error::LabelingCancelled)
        };
        assert!(matches!(
            oracle.label(&rec("a"), &rec("b")),
            Err(Error::LabelingCancelled)
        ));
        drop(oracle);
        assert_eq!(calls, 1);
    }
}
