//! Application context: configuration, storage, and lazily-loaded engines.
//!
//! The context replaces process-global caches: the caller owns one
//! `AppContext` and passes it to operations, so "reload the index" and
//! "when does the model load" are explicit decisions instead of side
//! effects of whichever call happened first.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use homedir::my_home;

use crate::config::Config;
use crate::extract::LocalExtractor;
use crate::faces::KnownFaces;
use crate::records::IndexStore;
use crate::storage::BackendLocal;
use crate::thumbs;

pub struct AppContext {
    base_path: PathBuf,
    pub config: Config,
    pub storage: BackendLocal,
    store: Option<IndexStore>,
    extractor: Option<LocalExtractor>,
}

impl AppContext {
    pub fn open() -> Result<Self> {
        let base_path = base_path()?;
        Self::open_at(&base_path)
    }

    pub fn open_at(base_path: &Path) -> Result<Self> {
        let storage = BackendLocal::new(base_path).with_context(|| {
            format!(
                "cannot create application directory {}",
                base_path.display()
            )
        })?;
        let config = Config::load_with(base_path);
        Ok(Self {
            base_path: base_path.to_path_buf(),
            config,
            storage,
            store: None,
            extractor: None,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn thumbs_dir(&self) -> PathBuf {
        self.base_path.join(thumbs::THUMBS_DIR)
    }

    /// The index store, read from disk on first access.
    pub fn store(&mut self) -> &IndexStore {
        let storage = &self.storage;
        self.store.get_or_insert_with(|| IndexStore::load(storage))
    }

    /// Drop the in-memory store so the next access re-reads disk.
    pub fn invalidate_store(&mut self) {
        self.store = None;
    }

    pub fn known_faces(&self) -> KnownFaces {
        KnownFaces::load(&self.storage)
    }

    /// The extraction stack, initialized on first use (model load is slow).
    pub fn extractor(&mut self) -> Result<&LocalExtractor> {
        self.init_extractor()?;
        Ok(self.extractor.as_ref().expect("extractor initialized above"))
    }

    /// Everything an index build borrows at once: the extractor, the
    /// mutable store, and the storage backend to persist into.
    pub fn indexing_parts(
        &mut self,
    ) -> Result<(&LocalExtractor, &mut IndexStore, &BackendLocal)> {
        self.init_extractor()?;
        let storage = &self.storage;
        let store = self.store.get_or_insert_with(|| IndexStore::load(storage));
        let extractor = self.extractor.as_ref().expect("extractor initialized above");
        Ok((extractor, store, &self.storage))
    }

    fn init_extractor(&mut self) -> Result<()> {
        if self.extractor.is_none() {
            let extractor = LocalExtractor::new(&self.config, &self.base_path)
                .context("failed to initialize the extraction stack")?;
            self.extractor = Some(extractor);
        }
        Ok(())
    }
}

/// `$SNAPSCOUT_BASE_PATH`, or `~/.local/share/snapscout`.
pub fn base_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os("SNAPSCOUT_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }
    let home = my_home()
        .context("could not determine home directory")?
        .context("home directory path is empty")?;
    Ok(home.join(".local/share/snapscout"))
}
