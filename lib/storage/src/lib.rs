//! # LinkX Storage
//!
//! On-disk artifacts of the pipeline:
//!
//! - settings files holding a [`linkx_similarity::TrainedModel`]
//! - JSON training corpora of labeled record-ID pairs
//! - an LMDB-backed [`linkx_core::BlockIndex`] for large gazetteers

pub mod lmdb_index;
pub mod settings;
pub mod training;

pub use lmdb_index::LmdbBlockIndex;
pub use settings::{inspect_settings, read_settings, write_settings, SettingsInfo, SETTINGS_MAGIC, SETTINGS_VERSION};
pub use training::{read_training, write_training, TRAINING_VERSION};
