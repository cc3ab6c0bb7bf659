// Settings persistence for trained models
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use linkx_core::{Error, Predicate, Result};
use linkx_schema::{ComparatorRegistry, FieldDeclaration, FieldSchema};
use linkx_similarity::{Scorer, TrainedModel};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// File magic of a settings artifact
pub const SETTINGS_MAGIC: &[u8; 4] = b"LNKX";
/// Current settings format version
pub const SETTINGS_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

/// Everything needed to rebuild a [`TrainedModel`] without labeling again.
#[derive(Debug, Serialize, Deserialize)]
struct SettingsPayload {
    fingerprint: String,
    created_at: DateTime<Utc>,
    declarations: Vec<FieldDeclaration>,
    scorer: Scorer,
    predicates: Vec<Predicate>,
    threshold: f64,
}

/// Metadata of a settings file, readable without a comparator registry
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsInfo {
    pub version: u32,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub fields: usize,
    pub predicates: usize,
}

/// Write a trained model to `path` atomically.
pub fn write_settings<P: AsRef<Path>>(path: P, model: &TrainedModel) -> Result<()> {
    let path = path.as_ref();
    let payload = SettingsPayload {
        fingerprint: model.schema().fingerprint().to_string(),
        created_at: Utc::now(),
        declarations: model.schema().declarations().to_vec(),
        scorer: model.scorer()?.clone(),
        predicates: model.predicates().to_vec(),
        threshold: model.threshold(),
    };
    let body = bincode::serialize(&payload).map_err(|e| Error::Serialization(e.to_string()))?;

    let mut data = Vec::with_capacity(HEADER_LEN + body.len());
    data.extend_from_slice(SETTINGS_MAGIC);
    data.extend_from_slice(&SETTINGS_VERSION.to_le_bytes());
    data.extend_from_slice(&body);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(&data))
        .map_err(|e| Error::Storage(format!("failed to write settings {}: {}", path.display(), e)))?;

    tracing::info!(
        path = %path.display(),
        fields = payload.declarations.len(),
        predicates = payload.predicates.len(),
        threshold = payload.threshold,
        "wrote settings"
    );
    Ok(())
}

/// Load a trained model, resolving custom comparators against `registry`.
///
/// Corrupt, truncated, foreign or newer files fail with
/// [`Error::PersistenceFormat`]; an unregistered custom comparator fails
/// with [`Error::Configuration`].
pub fn read_settings<P: AsRef<Path>>(path: P, registry: &ComparatorRegistry) -> Result<TrainedModel> {
    let path = path.as_ref();
    let payload = read_payload(path)?;

    let schema = FieldSchema::new(payload.declarations, registry)?;
    if schema.fingerprint() != payload.fingerprint {
        return Err(Error::PersistenceFormat(format!(
            "schema fingerprint mismatch in {}",
            path.display()
        )));
    }

    let model = TrainedModel::new(schema, payload.scorer, payload.predicates, payload.threshold)
        .map_err(|e| match e {
            Error::Configuration(msg) => Error::PersistenceFormat(msg),
            other => other,
        })?;

    tracing::info!(
        path = %path.display(),
        created_at = %payload.created_at,
        predicates = model.predicates().len(),
        "loaded settings"
    );
    Ok(model)
}

/// Read the header and summary of a settings file.
pub fn inspect_settings<P: AsRef<Path>>(path: P) -> Result<SettingsInfo> {
    let payload = read_payload(path.as_ref())?;
    Ok(SettingsInfo {
        version: SETTINGS_VERSION,
        fingerprint: payload.fingerprint,
        created_at: payload.created_at,
        fields: payload.declarations.len(),
        predicates: payload.predicates.len(),
    })
}

fn read_payload(path: &Path) -> Result<SettingsPayload> {
    let data = std::fs::read(path)?;
    if data.len() < HEADER_LEN {
        return Err(Error::PersistenceFormat(format!(
            "{} is truncated ({} bytes)",
            path.display(),
            data.len()
        )));
    }
    if &data[..4] != SETTINGS_MAGIC {
        return Err(Error::PersistenceFormat(format!(
            "{} is not a settings file",
            path.display()
        )));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&data[4..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != SETTINGS_VERSION {
        return Err(Error::PersistenceFormat(format!(
            "unsupported settings version {} (expected {})",
            version, SETTINGS_VERSION
        )));
    }

    bincode::deserialize(&data[HEADER_LEN..])
        .map_err(|e| Error::PersistenceFormat(format!("corrupt settings {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkx_core::{PredicateKind, Record};
    use tempfile::tempdir;

    fn model() -> TrainedModel {
        let schema = FieldSchema::new(
            vec![
                FieldDeclaration::string("name"),
                FieldDeclaration::exact("city").with_missing(),
            ],
            &ComparatorRegistry::new(),
        )
        .unwrap();
        let scorer = Scorer {
            weights: vec![3.25, 1.5],
            missing_weights: vec![0.0, -0.75],
            bias: -2.125,
        };
        let predicates = vec![
            Predicate::new("name", PredicateKind::Prefix(3)),
            Predicate::new("city", PredicateKind::WholeField),
        ];
        TrainedModel::new(schema, scorer, predicates, 0.7).unwrap()
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.settings");
        let original = model();
        write_settings(&path, &original).unwrap();

        let loaded = read_settings(&path, &ComparatorRegistry::new()).unwrap();
        assert_eq!(loaded.scorer().unwrap(), original.scorer().unwrap());
        assert_eq!(loaded.predicates(), original.predicates());
        assert_eq!(loaded.threshold(), 0.7);
        assert_eq!(loaded.schema().fingerprint(), original.schema().fingerprint());

        let a = Record::from_pairs("a".into(), [("name", "acme corp")]);
        let b = Record::from_pairs("b".into(), [("name", "acme co"), ("city", "rome")]);
        assert_eq!(
            loaded.score_pair(&a, &b).to_bits(),
            original.score_pair(&a, &b).to_bits()
        );
    }

    #[test]
    fn test_rejects_wrong_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.settings");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00rest").unwrap();
        let err = read_settings(&path, &ComparatorRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::PersistenceFormat(_)));
    }

    #[test]
    fn test_rejects_wrong_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.settings");
        write_settings(&path, &model()).unwrap();
        let mut data = std::fs::read(&path).unwrap();
        data[4..8].copy_from_slice(&99u32.to_le_bytes());
        std::fs::write(&path, data).unwrap();
        let err = read_settings(&path, &ComparatorRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::PersistenceFormat(_)));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.settings");
        write_settings(&path, &model()).unwrap();
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() / 2]).unwrap();
        let err = read_settings(&path, &ComparatorRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::PersistenceFormat(_)));

        std::fs::write(&path, b"LNK").unwrap();
        let err = read_settings(&path, &ComparatorRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::PersistenceFormat(_)));
    }

    #[test]
    fn test_missing_custom_comparator_is_configuration_error() {
        fn always_one(_: &linkx_core::FieldValue, _: &linkx_core::FieldValue) -> f64 {
            1.0
        }
        let mut registry = ComparatorRegistry::new();
        registry.register("always_one", always_one);
        let schema = FieldSchema::new(vec![FieldDeclaration::custom("code", "always_one")], &registry).unwrap();
        let trained = TrainedModel::new(schema, Scorer::zeros(1), Vec::new(), 0.5).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.settings");
        write_settings(&path, &trained).unwrap();

        assert!(read_settings(&path, &registry).is_ok());
        let err = read_settings(&path, &ComparatorRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_inspect_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.settings");
        write_settings(&path, &model()).unwrap();
        let info = inspect_settings(&path).unwrap();
        assert_eq!(info.version, SETTINGS_VERSION);
        assert_eq!(info.fields, 2);
        assert_eq!(info.predicates, 2);
    }
}
