// Labeled training pairs on disk
use atomicwrites::{AtomicFile, OverwriteBehavior};
use linkx_core::{Error, Label, LabeledPair, RecordId, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Current training file version
pub const TRAINING_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrainingFile {
    version: u32,
    #[serde(rename = "match", default)]
    matches: Vec<(RecordId, RecordId)>,
    #[serde(rename = "distinct", default)]
    distincts: Vec<(RecordId, RecordId)>,
}

/// Write labeled pairs as pretty JSON, grouped by label.
///
/// Only record IDs are stored; reload them against the record sets with
/// `Trainer::mark_pairs_by_id`.
pub fn write_training<P: AsRef<Path>>(path: P, pairs: &[LabeledPair]) -> Result<()> {
    let path = path.as_ref();
    let mut file = TrainingFile {
        version: TRAINING_VERSION,
        ..Default::default()
    };
    for pair in pairs {
        let ids = pair.key();
        match pair.label {
            Label::Match => file.matches.push(ids),
            Label::Distinct => file.distincts.push(ids),
        }
    }
    file.matches.sort();
    file.matches.dedup();
    file.distincts.sort();
    file.distincts.dedup();

    let json = serde_json::to_vec_pretty(&file)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(&json))
        .map_err(|e| Error::Storage(format!("failed to write training {}: {}", path.display(), e)))?;

    tracing::info!(
        path = %path.display(),
        matches = file.matches.len(),
        distincts = file.distincts.len(),
        "wrote training pairs"
    );
    Ok(())
}

/// Read labeled ID pairs written by [`write_training`].
pub fn read_training<P: AsRef<Path>>(path: P) -> Result<Vec<(RecordId, RecordId, Label)>> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let file: TrainingFile = serde_json::from_slice(&data)
        .map_err(|e| Error::PersistenceFormat(format!("corrupt training file {}: {}", path.display(), e)))?;
    if file.version != TRAINING_VERSION {
        return Err(Error::PersistenceFormat(format!(
            "unsupported training version {} (expected {})",
            file.version, TRAINING_VERSION
        )));
    }

    let mut pairs = Vec::with_capacity(file.matches.len() + file.distincts.len());
    pairs.extend(file.matches.into_iter().map(|(a, b)| (a, b, Label::Match)));
    pairs.extend(file.distincts.into_iter().map(|(a, b)| (a, b, Label::Distinct)));
    tracing::debug!(path = %path.display(), pairs = pairs.len(), "read training pairs");
    Ok(pairs)
}
