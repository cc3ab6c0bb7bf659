// LMDB-backed blocking map for large or persistent gazetteers
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use linkx_core::{BlockIndex, Error, Predicate, Record, RecordId, RecordSet, Result};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

const DB_BLOCKS: &str = "blocks";
const DB_META: &str = "meta";
const META_PREDICATES: &str = "predicates";

// LMDB rejects keys above 511 bytes
const MAX_INLINE_KEY: usize = 400;
const KEY_SEPARATOR: char = '\u{1f}';

/// Default LMDB map size (10GB, grows lazily on disk)
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024 * 1024;

/// Block index stored in an LMDB environment.
///
/// Blocks are keyed by `"{predicate position}\x1f{key}"` and hold a JSON
/// list of record IDs. The predicate list lives next to them, so an
/// environment built once can be reopened by another process and queried
/// straight away.
pub struct LmdbBlockIndex {
    env: Arc<Env>,
    blocks_db: Database<Str, Bytes>,
    meta_db: Database<Str, Bytes>,
    build_lock: Mutex<()>,
    predicates: RwLock<Option<Vec<Predicate>>>,
}

impl LmdbBlockIndex {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size<P: AsRef<Path>>(path: P, map_size: usize) -> Result<Self> {
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(4)
                .open(path.as_ref())
                .map_err(storage_err)?
        });

        let mut wtxn = env.write_txn().map_err(storage_err)?;
        let blocks_db = env
            .create_database(&mut wtxn, Some(DB_BLOCKS))
            .map_err(storage_err)?;
        let meta_db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, Some(DB_META))
            .map_err(storage_err)?;
        wtxn.commit().map_err(storage_err)?;

        let predicates = {
            let rtxn = env.read_txn().map_err(storage_err)?;
            match meta_db.get(&rtxn, META_PREDICATES).map_err(storage_err)? {
                Some(bytes) => Some(serde_json::from_slice::<Vec<Predicate>>(bytes)?),
                None => None,
            }
        };
        if let Some(p) = &predicates {
            tracing::info!(path = %path.as_ref().display(), predicates = p.len(), "reopened LMDB block index");
        }

        Ok(Self {
            env,
            blocks_db,
            meta_db,
            build_lock: Mutex::new(()),
            predicates: RwLock::new(predicates),
        })
    }

    /// Predicates the stored blocks were built with
    pub fn predicates(&self) -> Option<Vec<Predicate>> {
        self.predicates.read().clone()
    }

    /// Number of stored blocks
    pub fn block_count(&self) -> Result<u64> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        self.blocks_db.len(&rtxn).map_err(storage_err)
    }
}

impl BlockIndex for LmdbBlockIndex {
    fn build(&self, predicates: &[Predicate], reference: &RecordSet) -> Result<()> {
        let _build = self.build_lock.lock();

        let mut blocks: BTreeMap<String, BTreeSet<&RecordId>> = BTreeMap::new();
        for record in reference.iter() {
            for (pos, predicate) in predicates.iter().enumerate() {
                for key in predicate.keys(record) {
                    blocks.entry(block_key(pos, &key)).or_default().insert(&record.id);
                }
            }
        }

        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        self.blocks_db.clear(&mut wtxn).map_err(storage_err)?;
        for (key, ids) in &blocks {
            let value = serde_json::to_vec(ids)?;
            self.blocks_db.put(&mut wtxn, key, &value).map_err(storage_err)?;
        }
        let encoded = serde_json::to_vec(predicates)?;
        self.meta_db
            .put(&mut wtxn, META_PREDICATES, &encoded)
            .map_err(storage_err)?;

        // Readers see either the old predicates with the old blocks or the new
        // pair, never a mix
        let mut current = self.predicates.write();
        wtxn.commit().map_err(storage_err)?;
        *current = Some(predicates.to_vec());
        drop(current);

        tracing::debug!(
            records = reference.len(),
            predicates = predicates.len(),
            blocks = blocks.len(),
            "built LMDB block index"
        );
        Ok(())
    }

    fn candidates(&self, query: &Record) -> Result<BTreeSet<RecordId>> {
        let guard = self.predicates.read();
        let predicates = guard.as_ref().ok_or(Error::IndexNotBuilt)?;

        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let mut out = BTreeSet::new();
        for (pos, predicate) in predicates.iter().enumerate() {
            for key in predicate.keys(query) {
                if let Some(bytes) = self
                    .blocks_db
                    .get(&rtxn, &block_key(pos, &key))
                    .map_err(storage_err)?
                {
                    let ids: Vec<RecordId> = serde_json::from_slice(bytes)?;
                    out.extend(ids);
                }
            }
        }
        Ok(out)
    }

    fn is_built(&self) -> bool {
        self.predicates.read().is_some()
    }
}

fn block_key(pos: usize, key: &str) -> String {
    if key.len() <= MAX_INLINE_KEY {
        format!("{}{}{}", pos, KEY_SEPARATOR, key)
    } else {
        format!("{}{}#{:x}", pos, KEY_SEPARATOR, Sha256::digest(key.as_bytes()))
    }
}

fn storage_err(e: heed::Error) -> Error {
    Error::Storage(e.to_string())
}
