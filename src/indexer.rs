//! Incremental index construction.
//!
//! One sequential pass: enumerate candidates, skip files whose
//! `(mod_time, file_size)` fingerprint is unchanged, run the full
//! extraction pipeline on the rest, prune records for vanished files, and
//! persist. A failure on a single file never aborts the run.

use std::path::{Path, PathBuf};

use image::GenericImageView;
use walkdir::WalkDir;

use crate::extract::{ExtractError, Extractor};
use crate::records::{disk_fingerprint, IndexRecord, IndexStore, StoreError};
use crate::storage::StorageManager;
use crate::thumbs;

/// Raster formats considered when enumerating a folder. An explicit file
/// list bypasses this filter; the caller already chose its files.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp",
];

#[derive(Debug, Clone)]
pub enum IndexInput {
    /// A directory root, enumerated recursively with the extension filter.
    Folder(PathBuf),
    /// An explicit list of files, used verbatim.
    Files(Vec<PathBuf>),
}

#[derive(Debug, Clone, Copy)]
pub struct IndexOptions<'a> {
    pub thumbs_dir: &'a Path,
    pub thumbnail_max_dim: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexSummary {
    /// Files extracted this run (new or changed).
    pub processed: usize,
    /// Files skipped because their fingerprint was unchanged.
    pub skipped: usize,
    /// Files that failed extraction and were left out.
    pub failed: usize,
    /// Records removed because their file vanished from disk.
    pub pruned: usize,
    /// Candidate files seen this run.
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("input folder {0} is not a readable directory")]
    BadFolder(PathBuf),

    #[error("no candidate images found in the given inputs")]
    NoCandidates,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Build or refresh the index over `input`.
///
/// `on_status` is invoked synchronously once per file and once per phase;
/// `on_complete` fires after the store has been persisted, as a
/// synchronization signal for the caller.
pub fn build_index(
    input: &IndexInput,
    store: &mut IndexStore,
    extractor: &dyn Extractor,
    storage: &dyn StorageManager,
    opts: &IndexOptions,
    mut on_status: impl FnMut(&str),
    on_complete: impl FnOnce(),
) -> Result<IndexSummary, IndexError> {
    on_status("Scanning for images...");
    let candidates = enumerate(input)?;
    if candidates.is_empty() {
        return Err(IndexError::NoCandidates);
    }

    let mut summary = IndexSummary {
        total: candidates.len(),
        ..Default::default()
    };

    for (i, path) in candidates.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        on_status(&format!("[{}/{}] {}", i + 1, summary.total, name));

        let fingerprint = match disk_fingerprint(path) {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                log::warn!("cannot stat {}: {err}", path.display());
                summary.failed += 1;
                continue;
            }
        };

        let path_key = path.to_string_lossy();
        if let Some(existing) = store.get(&path_key) {
            if existing.change_fingerprint() == fingerprint {
                summary.skipped += 1;
                continue;
            }
            // Changed on disk: the stale record goes away before
            // re-extraction; records are replaced whole, never merged.
            store.remove(&path_key);
        }

        match extract_record(path, fingerprint, extractor, opts) {
            Ok(record) => {
                store.upsert(record);
                summary.processed += 1;
            }
            Err(err) => {
                log::warn!("skipping {}: {err}", path.display());
                on_status(&format!("Skipping {name}: {err}"));
                summary.failed += 1;
            }
        }
    }

    // Handles deletions, including files outside this run's inputs: prune
    // checks disk existence, not input membership.
    let removed = store.prune_missing();
    for record in &removed {
        thumbs::remove(record);
    }
    summary.pruned = removed.len();

    store.persist(storage)?;

    on_status(&format!(
        "Indexing complete: {} new or changed, {} unchanged, {} failed, {} removed, {} indexed.",
        summary.processed,
        summary.skipped,
        summary.failed,
        summary.pruned,
        store.len()
    ));
    on_complete();

    Ok(summary)
}

fn enumerate(input: &IndexInput) -> Result<Vec<PathBuf>, IndexError> {
    match input {
        IndexInput::Files(files) => Ok(files.clone()),
        IndexInput::Folder(root) => {
            if !root.is_dir() {
                return Err(IndexError::BadFolder(root.clone()));
            }
            let mut found = Vec::new();
            for entry in WalkDir::new(root) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        log::warn!("walk error under {}: {err}", root.display());
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.into_path();
                if has_image_extension(&path) {
                    found.push(path);
                }
            }
            Ok(found)
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Run the full extraction pipeline for one file and assemble the complete
/// replacement record.
fn extract_record(
    path: &Path,
    (mod_time, file_size): (u64, u64),
    extractor: &dyn Extractor,
    opts: &IndexOptions,
) -> Result<IndexRecord, ExtractError> {
    let image = image::open(path)?;
    let (width, height) = image.dimensions();

    let text = extractor.extract_text(&image)?.trim().to_string();
    let embedding = if text.is_empty() {
        Vec::new()
    } else {
        extractor.embed_text(&text)?
    };
    let faces = extractor.detect_faces(&image)?;

    let thumb = extractor.make_thumbnail(&image, opts.thumbnail_max_dim);
    let thumbnail_path = thumbs::write(&thumb, opts.thumbs_dir, path)?;

    let (face_locations, face_embeddings) = faces
        .into_iter()
        .map(|face| (face.location, face.embedding))
        .unzip();

    Ok(IndexRecord {
        file_path: path.to_string_lossy().into_owned(),
        thumbnail_path: thumbnail_path.to_string_lossy().into_owned(),
        text,
        embedding,
        face_embeddings,
        face_locations,
        width,
        height,
        mod_time,
        file_size,
    })
}
