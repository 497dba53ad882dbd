//! Tagged face identities.
//!
//! A small registry mapping a person's name to one reference face
//! embedding. Names are case-normalized to lowercase and double as search
//! queries: a query equal to a tagged name triggers the face-identity
//! branch of the ranker.

use std::collections::BTreeMap;
use std::io;

use crate::storage::StorageManager;

pub const FACES_FILE: &str = "known_faces.json";

#[derive(Debug, thiserror::Error)]
pub enum FacesError {
    #[error("failed to write known faces: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode known faces: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Name -> reference embedding. Names are unique; re-saving a name
/// overwrites its embedding.
#[derive(Debug, Default, Clone)]
pub struct KnownFaces {
    entries: BTreeMap<String, Vec<f32>>,
}

impl KnownFaces {
    /// Load from storage. Fails soft like the index store: a missing or
    /// unparsable file is an empty registry.
    pub fn load(storage: &dyn StorageManager) -> Self {
        let raw = match storage.read(FACES_FILE) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    log::warn!("could not read {FACES_FILE}: {err}; no tagged faces available");
                }
                return Self::default();
            }
        };

        match serde_json::from_slice::<BTreeMap<String, Vec<f32>>>(&raw) {
            Ok(entries) => Self { entries },
            Err(err) => {
                log::warn!("could not parse {FACES_FILE}: {err}; no tagged faces available");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|name| name.as_str())
    }

    /// Lookup by case-insensitive, whitespace-trimmed name.
    pub fn get(&self, name: &str) -> Option<(&str, &[f32])> {
        let key = name.trim().to_lowercase();
        self.entries
            .get_key_value(&key)
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Insert or overwrite a tagged identity and persist the whole registry.
    pub fn save_face(
        &mut self,
        name: &str,
        embedding: Vec<f32>,
        storage: &dyn StorageManager,
    ) -> Result<(), FacesError> {
        self.entries.insert(name.trim().to_lowercase(), embedding);
        let data = serde_json::to_vec_pretty(&self.entries)?;
        storage.write(FACES_FILE, &data)?;
        Ok(())
    }
}

/// Euclidean distance between two face embeddings.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackendLocal;

    fn backend() -> (tempfile::TempDir, BackendLocal) {
        let dir = tempfile::tempdir().unwrap();
        let backend = BackendLocal::new(dir.path()).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_save_and_load_normalizes_case() {
        let (_dir, backend) = backend();

        let mut faces = KnownFaces::default();
        faces
            .save_face("Alice", vec![0.1, 0.2, 0.3], &backend)
            .unwrap();

        let reloaded = KnownFaces::load(&backend);
        let (name, embedding) = reloaded.get("ALICE ").unwrap();
        assert_eq!(name, "alice");
        assert_eq!(embedding, &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_resave_overwrites() {
        let (_dir, backend) = backend();

        let mut faces = KnownFaces::default();
        faces.save_face("bob", vec![1.0], &backend).unwrap();
        faces.save_face("Bob", vec![2.0], &backend).unwrap();

        let reloaded = KnownFaces::load(&backend);
        assert_eq!(reloaded.names().count(), 1);
        assert_eq!(reloaded.get("bob").unwrap().1, &[2.0]);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let (_dir, backend) = backend();
        assert!(KnownFaces::load(&backend).is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let (_dir, backend) = backend();
        backend.write(FACES_FILE, b"{broken").unwrap();
        assert!(KnownFaces::load(&backend).is_empty());
    }

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }
}
