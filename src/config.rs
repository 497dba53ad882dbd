use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::{BackendLocal, StorageManager};

const CONFIG_FILE: &str = "config.yaml";

/// Default embedding model; the index format was built around MiniLM
/// vectors, so changing this invalidates stored embeddings.
const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
/// Default number of semantic-tier results
const DEFAULT_TOP_K: usize = 5;
/// Default partial-ratio score a record must reach for the fuzzy tier
const DEFAULT_FUZZY_THRESHOLD: f64 = 85.0;
/// Default Euclidean distance within which a face matches a tagged identity
const DEFAULT_FACE_TOLERANCE: f32 = 0.6;
/// Default Hamming distance at or under which two perceptual hashes count
/// as near-duplicates
const DEFAULT_NEAR_DUPE_THRESHOLD: u32 = 10;
/// Default bounding box for generated thumbnails
const DEFAULT_THUMBNAIL_MAX_DIM: u32 = 480;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Embedding model used for the semantic search tier
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum number of semantic-tier search results
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Fuzzy-tier cutoff, a partial-ratio score in [0, 100]
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Face-match cutoff, a Euclidean distance between embeddings
    #[serde(default = "default_face_tolerance")]
    pub face_tolerance: f32,

    /// Near-duplicate cutoff, a Hamming distance between perceptual hashes
    #[serde(default = "default_near_dupe_threshold")]
    pub near_dupe_threshold: u32,

    /// Longest side of generated thumbnails, in pixels
    #[serde(default = "default_thumbnail_max_dim")]
    pub thumbnail_max_dim: u32,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            face_tolerance: DEFAULT_FACE_TOLERANCE,
            near_dupe_threshold: DEFAULT_NEAR_DUPE_THRESHOLD,
            thumbnail_max_dim: DEFAULT_THUMBNAIL_MAX_DIM,
            base_path: PathBuf::new(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_fuzzy_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}

fn default_face_tolerance() -> f32 {
    DEFAULT_FACE_TOLERANCE
}

fn default_near_dupe_threshold() -> u32 {
    DEFAULT_NEAR_DUPE_THRESHOLD
}

fn default_thumbnail_max_dim() -> u32 {
    DEFAULT_THUMBNAIL_MAX_DIM
}

impl Config {
    fn validate(&self) {
        if !(0.0..=100.0).contains(&self.fuzzy_threshold) {
            panic!(
                "fuzzy_threshold must be between 0 and 100, got {}",
                self.fuzzy_threshold
            );
        }

        if self.face_tolerance <= 0.0 {
            panic!(
                "face_tolerance must be greater than 0, got {}",
                self.face_tolerance
            );
        }

        if self.top_k == 0 {
            panic!("top_k must be greater than 0");
        }

        if self.thumbnail_max_dim == 0 {
            panic!("thumbnail_max_dim must be greater than 0");
        }
    }

    pub fn load_with(base_path: &Path) -> Self {
        let store = BackendLocal::new(base_path).expect("cannot create application directory");

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            let _ = store.write(
                CONFIG_FILE,
                serde_yml::to_string(&Self::default()).unwrap().as_bytes(),
            );
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE).expect("cannot read config file"))
                .expect("config file is not valid utf8");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_path_buf();

        config.validate();

        // resave in case config gained fields since it was written
        if config_str != serde_yml::to_string(&config).unwrap() {
            config.save();
        }

        config
    }

    pub fn save(&self) {
        let store = BackendLocal::new(&self.base_path).expect("cannot create application directory");

        let config_str = serde_yml::to_string(&self).unwrap();
        let _ = store.write(CONFIG_FILE, config_str.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model, "all-MiniLM-L6-v2");
        assert_eq!(config.top_k, 5);
        assert_eq!(config.fuzzy_threshold, 85.0);
        assert_eq!(config.face_tolerance, 0.6);
        assert_eq!(config.near_dupe_threshold, 10);
    }

    #[test]
    fn test_load_creates_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let config = Config::load_with(dir.path());
        assert!(dir.path().join(CONFIG_FILE).is_file());
        assert_eq!(config.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn test_load_upgrades_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "top_k: 9\n").unwrap();

        let config = Config::load_with(dir.path());
        assert_eq!(config.top_k, 9);
        assert_eq!(config.fuzzy_threshold, DEFAULT_FUZZY_THRESHOLD);

        // missing fields are filled in and written back
        let rewritten = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(rewritten.contains("fuzzy_threshold"));
    }

    #[test]
    #[should_panic(expected = "fuzzy_threshold")]
    fn test_invalid_fuzzy_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "fuzzy_threshold: 150\n").unwrap();

        Config::load_with(dir.path());
    }

    #[test]
    #[should_panic(expected = "top_k")]
    fn test_zero_top_k_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "top_k: 0\n").unwrap();

        Config::load_with(dir.path());
    }
}
