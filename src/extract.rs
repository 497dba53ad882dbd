//! Extraction capabilities consumed by the indexing engine.
//!
//! OCR, embeddings, face detection and thumbnail scaling are injected
//! behind the [`Extractor`] trait, so indexing and search policy never
//! call model code directly.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{DynamicImage, ImageFormat};

use crate::config::Config;
use crate::embeddings::{EmbeddingError, EmbeddingModel};
use crate::records::FaceLocation;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One detected face. Box and embedding refer to the same physical face.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub location: FaceLocation,
    pub embedding: Vec<f32>,
}

/// Text-to-vector encoding. Split out of [`Extractor`] because the search
/// ranker needs it for queries without the rest of the pipeline.
pub trait TextEmbedder {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, ExtractError>;
}

/// The capability bundle the indexing engine runs per image.
pub trait Extractor: TextEmbedder {
    fn extract_text(&self, image: &DynamicImage) -> Result<String, ExtractError>;

    fn detect_faces(&self, image: &DynamicImage) -> Result<Vec<DetectedFace>, ExtractError>;

    /// Aspect-preserving downscale; never upscales.
    fn make_thumbnail(&self, image: &DynamicImage, max_dim: u32) -> DynamicImage {
        image.thumbnail(max_dim, max_dim)
    }
}

static OCR_SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The extraction stack shipped with the CLI: OCR through a `tesseract`
/// binary when one is on PATH, text embeddings through fastembed. Face
/// detection has no bundled model; supply an [`Extractor`] with a real
/// implementation to enable it.
pub struct LocalExtractor {
    model: EmbeddingModel,
    tesseract: Option<PathBuf>,
}

impl LocalExtractor {
    pub fn new(config: &Config, cache_dir: &Path) -> Result<Self, ExtractError> {
        let model = EmbeddingModel::new(&config.model, cache_dir.to_path_buf())?;
        log::debug!(
            "embedding model {} ready ({} dimensions)",
            model.name(),
            model.dimensions()
        );
        let tesseract = find_tesseract();
        if tesseract.is_none() {
            log::warn!("no tesseract binary on PATH; indexed records will have no OCR text");
        }
        Ok(Self { model, tesseract })
    }
}

impl TextEmbedder for LocalExtractor {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, ExtractError> {
        Ok(self.model.embed(text)?)
    }
}

impl Extractor for LocalExtractor {
    fn extract_text(&self, image: &DynamicImage) -> Result<String, ExtractError> {
        let Some(tesseract) = &self.tesseract else {
            return Ok(String::new());
        };

        // tesseract reads files, not pipes; hand it a scratch PNG
        let scratch = std::env::temp_dir().join(format!(
            "snapscout-ocr-{}-{}.png",
            std::process::id(),
            OCR_SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        image.save_with_format(&scratch, ImageFormat::Png)?;

        let output = Command::new(tesseract)
            .arg(&scratch)
            .arg("stdout")
            .arg("-l")
            .arg("eng")
            .output();
        let _ = std::fs::remove_file(&scratch);

        let output = output.map_err(|e| ExtractError::Ocr(e.to_string()))?;
        if !output.status.success() {
            return Err(ExtractError::Ocr(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn detect_faces(&self, _image: &DynamicImage) -> Result<Vec<DetectedFace>, ExtractError> {
        Ok(Vec::new())
    }
}

fn find_tesseract() -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join("tesseract"))
        .find(|candidate| candidate.is_file())
}
