//! JSON pipeline configuration for the `linkx` binary

use anyhow::{bail, Context, Result};
use linkx_core::BlockIndex;
use linkx_learn::TrainOptions;
use linkx_matcher::MatchConfig;
use linkx_schema::FieldDeclaration;
use linkx_storage::LmdbBlockIndex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where the blocking map of the matcher lives
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IndexBackend {
    #[default]
    Memory,
    Lmdb(PathBuf),
}

impl IndexBackend {
    pub fn open(&self) -> Result<Box<dyn BlockIndex>> {
        let index: Box<dyn BlockIndex> = match self {
            IndexBackend::Memory => Box::new(linkx_core::MemoryBlockIndex::new()),
            IndexBackend::Lmdb(dir) => Box::new(
                LmdbBlockIndex::open(dir)
                    .with_context(|| format!("failed to open LMDB index at {}", dir.display()))?,
            ),
        };
        Ok(index)
    }
}

impl FromStr for IndexBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "memory" => Ok(IndexBackend::Memory),
            _ => match s.strip_prefix("lmdb:") {
                Some(dir) if !dir.is_empty() => Ok(IndexBackend::Lmdb(PathBuf::from(dir))),
                _ => Err(format!("unknown index backend '{}' (expected memory or lmdb:<dir>)", s)),
            },
        }
    }
}

impl TryFrom<String> for IndexBackend {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IndexBackend> for String {
    fn from(backend: IndexBackend) -> Self {
        backend.to_string()
    }
}

impl fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexBackend::Memory => write!(f, "memory"),
            IndexBackend::Lmdb(dir) => write!(f, "lmdb:{}", dir.display()),
        }
    }
}

/// Everything one pipeline run needs besides its input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fields: Vec<FieldDeclaration>,
    /// Columns concatenated into a single `Address` field
    pub merge_address_fields: Vec<String>,
    pub train: TrainOptions,
    pub matching: MatchConfig,
    pub sample_size: usize,
    /// Sampled records paired with themselves and marked as matches
    pub exact_seed: usize,
    pub seed: u64,
    pub recall_weight: f64,
    pub settings_file: PathBuf,
    pub training_file: PathBuf,
    pub output_file: PathBuf,
    pub inner_join: bool,
    pub backend: IndexBackend,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fields: vec![FieldDeclaration::string("Address")],
            merge_address_fields: Vec::new(),
            train: TrainOptions::default(),
            matching: MatchConfig::default(),
            sample_size: 15_000,
            exact_seed: 10,
            seed: 42,
            recall_weight: 10.0,
            settings_file: PathBuf::from("address_matching_learned_settings"),
            training_file: PathBuf::from("address_matching_training.json"),
            output_file: PathBuf::from("address_matching_output.csv"),
            inner_join: true,
            backend: IndexBackend::Memory,
        }
    }
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self =
            serde_json::from_slice(&data).with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            bail!("config declares no fields");
        }
        if self.sample_size == 0 {
            bail!("sample_size must be positive");
        }
        if !(self.recall_weight.is_finite() && self.recall_weight > 0.0) {
            bail!("recall_weight must be a positive number, got {}", self.recall_weight);
        }
        self.train.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("memory".parse::<IndexBackend>().unwrap(), IndexBackend::Memory);
        assert_eq!(
            "lmdb:/tmp/blocks".parse::<IndexBackend>().unwrap(),
            IndexBackend::Lmdb(PathBuf::from("/tmp/blocks"))
        );
        assert!("lmdb:".parse::<IndexBackend>().is_err());
        assert!("redis".parse::<IndexBackend>().is_err());
        assert_eq!(IndexBackend::Lmdb(PathBuf::from("x")).to_string(), "lmdb:x");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{
            "fields": [{"name": "Address", "comparator": {"string": "levenshtein"}}],
            "recall_weight": 2.0,
            "backend": "lmdb:blocks",
            "train": {"uncovered_dupes": 1}
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.recall_weight, 2.0);
        assert_eq!(config.seed, 42);
        assert_eq!(config.train.uncovered_dupes, 1);
        assert_eq!(config.train.min_predicate_coverage, 1);
        assert_eq!(config.backend, IndexBackend::Lmdb(PathBuf::from("blocks")));
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = PipelineConfig {
            recall_weight: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            fields: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig::default();
        std::fs::write(&path, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap(), config);
    }
}
