//! Durable file storage for the application directory.
//!
//! Everything snapscout persists (index, known faces, config) goes through
//! [`StorageManager`], so on-disk layout and atomic-replace behavior live
//! in one place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> io::Result<()>;
    fn read(&self, ident: &str) -> io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
    fn delete(&self, ident: &str) -> io::Result<()>;
    fn list(&self) -> Vec<String>;
}

/// Local-filesystem backend rooted at the application base directory.
#[derive(Clone)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(base_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(base_dir)?;
        Ok(BackendLocal {
            base_dir: base_dir.to_path_buf(),
        })
    }

    fn path_for(&self, ident: &str) -> PathBuf {
        self.base_dir.join(ident)
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        self.path_for(ident).is_file()
    }

    fn read(&self, ident: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path_for(ident))
    }

    // Write-whole-file-then-rename, so a crash mid-write never leaves a
    // truncated file under the real name.
    fn write(&self, ident: &str, data: &[u8]) -> io::Result<()> {
        let path = self.path_for(ident);
        let temp_path = self.path_for(&format!("{ident}.tmp"));

        if let Err(err) = fs::write(&temp_path, data) {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }

        fs::rename(&temp_path, &path)
    }

    fn delete(&self, ident: &str) -> io::Result<()> {
        fs::remove_file(self.path_for(ident))
    }

    fn list(&self) -> Vec<String> {
        fs::read_dir(&self.base_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| {
                        let path = entry.path();
                        if path.is_file() {
                            path.file_name()
                                .and_then(|name| name.to_str())
                                .map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (tempfile::TempDir, BackendLocal) {
        let dir = tempfile::tempdir().unwrap();
        let backend = BackendLocal::new(dir.path()).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (_dir, backend) = backend();

        backend.write("data.json", b"[1,2,3]").unwrap();
        assert!(backend.exists("data.json"));
        assert_eq!(backend.read("data.json").unwrap(), b"[1,2,3]");
    }

    #[test]
    fn test_write_replaces_existing() {
        let (_dir, backend) = backend();

        backend.write("data.json", b"old").unwrap();
        backend.write("data.json", b"new").unwrap();
        assert_eq!(backend.read("data.json").unwrap(), b"new");
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let (_dir, backend) = backend();

        backend.write("data.json", b"payload").unwrap();
        assert!(!backend.exists("data.json.tmp"));
    }

    #[test]
    fn test_missing_file() {
        let (_dir, backend) = backend();

        assert!(!backend.exists("nothing"));
        assert!(backend.read("nothing").is_err());
    }

    #[test]
    fn test_delete() {
        let (_dir, backend) = backend();

        backend.write("data.json", b"x").unwrap();
        backend.delete("data.json").unwrap();
        assert!(!backend.exists("data.json"));
    }

    #[test]
    fn test_list_files_only() {
        let (dir, backend) = backend();

        backend.write("a.json", b"a").unwrap();
        backend.write("b.json", b"b").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let mut names = backend.list();
        names.sort();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }
}
