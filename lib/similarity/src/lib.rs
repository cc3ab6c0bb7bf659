//! # LinkX Similarity
//!
//! Pairwise featurization and learned scoring.
//!
//! - **Featurization**: one similarity per schema field, interactions computed
//!   from earlier slots, NaN for missing values
//! - **Learning**: a [`Learner`] fits a [`Scorer`] from labeled vectors
//! - **Scoring**: `sigmoid(bias + w·x + m·missing)`, a match probability
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ FieldSchema │────>│ Featurizer  │────>│   Scorer    │
//! │  (fields)   │     │ (pair→x)    │     │  (x→p)      │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                ^
//!                     ┌─────────────┐            │
//!                     │   Learner   │────────────┘
//!                     │ (labels→w)  │
//!                     └─────────────┘
//! ```

pub mod learner;
pub mod model;
pub mod trained;

pub use learner::{Learner, LogisticRegression};
pub use model::{sigmoid, FeatureVector, Scorer, SimilarityModel};
pub use trained::{TrainedModel, DEFAULT_THRESHOLD};
