//! The per-file index record and the on-disk index store.
//!
//! Records are whole units: re-extraction replaces a record, nothing
//! merges field-by-field. The store keeps insertion order, which is the
//! "natural order" search results and duplicate scans iterate in.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::storage::StorageManager;

pub const INDEX_FILE: &str = "index.json";

/// Bumped whenever [`IndexRecord`] gains fields. Older files load with
/// serde defaults filling the gaps; newer files are treated as unreadable.
pub const SCHEMA_VERSION: u32 = 2;

/// Face bounding box in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Absolute path of the source image; the store's primary key.
    /// Existence is not guaranteed at read time.
    pub file_path: String,

    /// Derived preview JPEG, owned by this record and deleted with it.
    #[serde(default)]
    pub thumbnail_path: String,

    /// OCR output, trimmed; may be empty.
    #[serde(default)]
    pub text: String,

    /// Semantic embedding of `text`; empty when `text` is empty.
    #[serde(default)]
    pub embedding: Vec<f32>,

    /// One embedding per detected face, parallel to `face_locations`:
    /// index `i` in both refers to the same physical face.
    #[serde(default)]
    pub face_embeddings: Vec<Vec<f32>>,

    #[serde(default)]
    pub face_locations: Vec<FaceLocation>,

    /// Original image dimensions, for remapping face boxes onto the
    /// independently-scaled thumbnail.
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,

    /// Filesystem snapshot taken at extraction time; compared against the
    /// disk to decide whether re-extraction is needed.
    #[serde(default)]
    pub mod_time: u64,
    #[serde(default)]
    pub file_size: u64,
}

impl IndexRecord {
    /// The cheap change-detection fingerprint stored at extraction time.
    pub fn change_fingerprint(&self) -> (u64, u64) {
        (self.mod_time, self.file_size)
    }
}

/// Stat `path` and produce the `(mod_time, file_size)` tuple compared
/// against [`IndexRecord::change_fingerprint`].
pub fn disk_fingerprint(path: &Path) -> io::Result<(u64, u64)> {
    let meta = std::fs::metadata(path)?;
    let mod_time = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok((mod_time, meta.len()))
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write index: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode index: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct IndexEnvelope {
    version: u32,
    records: Vec<IndexRecord>,
}

#[derive(Debug, Default)]
pub struct IndexStore {
    records: Vec<IndexRecord>,
    by_path: HashMap<String, usize>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<IndexRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.upsert(record);
        }
        store
    }

    /// Load from storage. Fails soft: a missing or unparsable index means
    /// an empty store, since the index can always be rebuilt.
    pub fn load(storage: &dyn StorageManager) -> Self {
        let raw = match storage.read(INDEX_FILE) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    log::warn!("could not read {INDEX_FILE}: {err}; starting with an empty index");
                }
                return Self::new();
            }
        };

        match Self::decode(&raw) {
            Ok(records) => Self::from_records(records),
            Err(err) => {
                log::warn!("could not parse {INDEX_FILE}: {err}; starting with an empty index");
                Self::new()
            }
        }
    }

    fn decode(raw: &[u8]) -> Result<Vec<IndexRecord>, serde_json::Error> {
        match serde_json::from_slice::<IndexEnvelope>(raw) {
            Ok(envelope) if envelope.version <= SCHEMA_VERSION => Ok(envelope.records),
            Ok(envelope) => {
                log::warn!(
                    "index schema version {} is newer than supported {}; starting fresh",
                    envelope.version,
                    SCHEMA_VERSION
                );
                Ok(Vec::new())
            }
            // Indexes written before the envelope existed are a bare array.
            Err(_) => serde_json::from_slice::<Vec<IndexRecord>>(raw),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&IndexRecord> {
        self.by_path.get(path).map(|&idx| &self.records[idx])
    }

    /// Records in store (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexRecord> {
        self.records.iter()
    }

    /// Replace any existing record with the same path, keeping its position
    /// in store order, or append a new one. Records are replaced whole;
    /// there is no field-level merge.
    pub fn upsert(&mut self, record: IndexRecord) {
        match self.by_path.get(&record.file_path) {
            Some(&idx) => self.records[idx] = record,
            None => {
                self.by_path
                    .insert(record.file_path.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn remove(&mut self, path: &str) -> Option<IndexRecord> {
        let idx = self.by_path.remove(path)?;
        let record = self.records.remove(idx);
        self.reindex();
        Some(record)
    }

    /// Drop every record whose file no longer exists on disk, regardless of
    /// whether the current run looked at it. Returns the removed records so
    /// the caller can clean up what they own (thumbnails).
    pub fn prune_missing(&mut self) -> Vec<IndexRecord> {
        let (kept, removed): (Vec<_>, Vec<_>) = self
            .records
            .drain(..)
            .partition(|record| Path::new(&record.file_path).exists());
        self.records = kept;
        self.reindex();
        removed
    }

    fn reindex(&mut self) {
        self.by_path = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.file_path.clone(), idx))
            .collect();
    }

    /// Atomically write the whole record set back to storage.
    pub fn persist(&self, storage: &dyn StorageManager) -> Result<(), StoreError> {
        let envelope = IndexEnvelope {
            version: SCHEMA_VERSION,
            records: self.records.clone(),
        };
        let data = serde_json::to_vec_pretty(&envelope)?;
        storage.write(INDEX_FILE, &data)?;
        Ok(())
    }
}
