//! # LinkX Learn
//!
//! Active learning for record linkage.
//!
//! The [`Trainer`] samples candidate pairs, asks a [`LabelingOracle`] about
//! the pairs the current model is least sure of, fits the scorer and picks
//! a small set of blocking predicates covering the labeled duplicates.
//!
//! ## Example
//!
//! ```rust,no_run
//! use linkx_learn::{PrelabeledOracle, TrainOptions, Trainer};
//! use linkx_core::{Label, RecordSet};
//! use linkx_schema::{ComparatorRegistry, FieldDeclaration, FieldSchema};
//!
//! # fn run(messy: RecordSet, canonical: RecordSet) -> linkx_core::Result<()> {
//! let schema = FieldSchema::new(vec![FieldDeclaration::string("address")], &ComparatorRegistry::new())?;
//! let mut trainer = Trainer::new(schema).with_seed(42);
//! trainer.sample(&messy, &canonical, 10_000)?;
//! trainer.label(&mut PrelabeledOracle::new().with_unknown(Label::Distinct))?;
//! let (model, report) = trainer.train(&TrainOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod cover;
pub mod oracle;
pub mod sampling;
pub mod trainer;

pub use cover::{greedy_cover, CoverCandidate, CoverResult, TieBreak};
pub use oracle::{LabelResponse, LabelingOracle, PrelabeledOracle};
pub use sampling::Pair;
pub use trainer::{TrainOptions, TrainReport, Trainer, TrainerState};
