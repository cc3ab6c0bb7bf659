//! # LinkX Matcher
//!
//! Applies a trained model to whole record sets.
//!
//! - [`Matcher::match_sets`] links two sets and clusters the matches
//! - [`Matcher::dedupe`] clusters duplicates within one set
//! - [`Matcher::index`] + [`Matcher::search`] answer gazetteer queries
//! - [`select_threshold`] picks the F-beta optimal decision threshold

pub mod matcher;
pub mod threshold;

pub use matcher::{MatchConfig, MatchResult, Matcher};
pub use threshold::{select_threshold, FALLBACK_THRESHOLD};
