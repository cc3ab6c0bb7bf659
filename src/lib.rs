//! # LinkX
//!
//! Trainable record linkage and deduplication.
//!
//! LinkX learns from a handful of human-labeled pairs which records refer
//! to the same real-world entity. It fits a scorer over per-field
//! similarities, learns blocking predicates so that only plausible pairs
//! are ever compared, and then links two record sets, deduplicates one, or
//! answers gazetteer queries against a reference set.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! linkx link --canonical data/canonical.csv --messy data/messy.csv
//! linkx search --canonical data/canonical.csv --messy data/messy.csv --limit 1
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use linkx::prelude::*;
//!
//! # fn run(canonical: RecordSet, messy: RecordSet) -> linkx::Result<()> {
//! let schema = FieldSchema::new(vec![FieldDeclaration::string("address")], &ComparatorRegistry::new())?;
//!
//! let mut trainer = Trainer::new(schema).with_seed(42);
//! trainer.sample(&messy, &canonical, 10_000)?;
//! trainer.label(&mut PrelabeledOracle::new().with_unknown(Label::Distinct))?;
//! let (model, _report) = trainer.train(&TrainOptions::default())?;
//!
//! let mut matcher = Matcher::new(model);
//! let threshold = matcher.threshold(&messy, &canonical, 2.0)?;
//! let clusters = matcher.match_sets(&messy, &canonical, threshold)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - [`linkx-core`](https://docs.rs/linkx-core) - records, blocking predicates, block index, clustering
//! - [`linkx-schema`](https://docs.rs/linkx-schema) - field declarations and comparators
//! - [`linkx-similarity`](https://docs.rs/linkx-similarity) - featurizer, learner, trained model
//! - [`linkx-learn`](https://docs.rs/linkx-learn) - active learning and predicate selection
//! - [`linkx-matcher`](https://docs.rs/linkx-matcher) - thresholding, matching, search
//! - [`linkx-storage`](https://docs.rs/linkx-storage) - settings, training corpora, LMDB index

pub mod config;
pub mod console;
pub mod csv_source;
pub mod output;

// Re-export core types
pub use linkx_core::{
    connected_components, linked_components, BlockIndex, Cluster, Error, FieldValue, Label, LabeledPair,
    MemoryBlockIndex, Predicate, PredicateKind, Record, RecordId, RecordSet, RecordSource, Result, ScoredPair,
};

pub use linkx_schema::{Comparator, ComparatorRegistry, FieldDeclaration, FieldSchema, StringMetric};

pub use linkx_similarity::{Learner, LogisticRegression, Scorer, SimilarityModel, TrainedModel};

pub use linkx_learn::{
    LabelResponse, LabelingOracle, PrelabeledOracle, TieBreak, TrainOptions, TrainReport, Trainer, TrainerState,
};

pub use linkx_matcher::{select_threshold, MatchConfig, MatchResult, Matcher};

pub use linkx_storage::{read_settings, read_training, write_settings, write_training, LmdbBlockIndex};

pub use config::{IndexBackend, PipelineConfig};
pub use console::ConsoleOracle;
pub use csv_source::{preprocess, CsvSource, CsvTable};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BlockIndex, Cluster, ComparatorRegistry, Error, FieldDeclaration, FieldSchema, FieldValue, Label,
        LabelResponse, LabelingOracle, LabeledPair, MatchResult, Matcher, MemoryBlockIndex, PrelabeledOracle,
        Record, RecordId, RecordSet, Result, TrainOptions, TrainedModel, Trainer,
    };
}
