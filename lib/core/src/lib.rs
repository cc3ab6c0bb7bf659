//! # LinkX Core
//!
//! Core data structures for the LinkX record linkage pipeline.
//!
//! - [`Record`] - An immutable record with an ID and normalized field values
//! - [`RecordSet`] - Records keyed and iterated in ID order
//! - [`Predicate`] - A blocking rule mapping a record to keys
//! - [`BlockIndex`] - Candidate generation over a reference set
//! - [`connected_components`] / [`linked_components`] - Union-find clustering of scored pairs
//!
//! ## Example
//!
//! ```rust
//! use linkx_core::{BlockIndex, MemoryBlockIndex, Predicate, PredicateKind, Record, RecordId, RecordSet};
//!
//! let reference: RecordSet = vec![
//!     Record::from_pairs(RecordId::from("c1"), [("address", "100 main st")]),
//!     Record::from_pairs(RecordId::from("c2"), [("address", "200 oak ave")]),
//! ]
//! .into_iter()
//! .collect();
//!
//! let index = MemoryBlockIndex::new();
//! index
//!     .build(&[Predicate::new("address", PredicateKind::FirstToken)], &reference)
//!     .unwrap();
//!
//! let query = Record::from_pairs(RecordId::from("m1"), [("address", "100 main street")]);
//! let hits = index.candidates(&query).unwrap();
//! assert!(hits.contains(&RecordId::from("c1")));
//! ```

pub mod block_index;
pub mod cluster;
pub mod error;
pub mod label;
pub mod predicate;
pub mod record;

pub use block_index::{BlockIndex, MemoryBlockIndex};
pub use cluster::{connected_components, linked_components, Cluster, ScoredPair};
pub use error::{Error, Result};
pub use label::{pair_key, Label, LabeledPair};
pub use predicate::{tokenize, Keys, Predicate, PredicateKind};
pub use record::{FieldValue, Record, RecordId, RecordSet, RecordSource};
