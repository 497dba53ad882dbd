//! Thumbnail files derived from indexed images.
//!
//! A thumbnail's name is a digest of its source path, so re-indexing an
//! unchanged tree overwrites thumbnails in place instead of accumulating
//! copies, and pruning a record identifies exactly one file to delete.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use sha2::{Digest, Sha256};

use crate::records::IndexRecord;

pub const THUMBS_DIR: &str = "thumbnails";

const JPEG_QUALITY: u8 = 85;

/// Deterministic thumbnail file name for a source image path.
pub fn file_name(source: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.to_string_lossy().as_bytes());
    let digest = hasher.finalize();

    let mut name = String::with_capacity(68);
    for byte in digest.iter() {
        name.push_str(&format!("{byte:02x}"));
    }
    name.push_str(".jpg");
    name
}

/// Encode `image` as a JPEG under `dir`, named after `source`.
pub fn write(image: &DynamicImage, dir: &Path, source: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name(source));

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

    Ok(path)
}

/// Best-effort removal of a pruned record's thumbnail.
pub fn remove(record: &IndexRecord) {
    if record.thumbnail_path.is_empty() {
        return;
    }
    if let Err(err) = fs::remove_file(&record.thumbnail_path) {
        if err.kind() != io::ErrorKind::NotFound {
            log::debug!("could not remove thumbnail {}: {err}", record.thumbnail_path);
        }
    }
}
