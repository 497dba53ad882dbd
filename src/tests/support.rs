//! Shared fixtures and extractor fakes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::DynamicImage;

use crate::extract::{DetectedFace, ExtractError, Extractor, TextEmbedder};
use crate::records::IndexRecord;

/// Extractor stub with canned outputs and an OCR call counter, so tests
/// can verify which files were actually re-extracted.
pub struct SpyExtractor {
    pub text: String,
    pub faces: Vec<DetectedFace>,
    ocr_calls: AtomicUsize,
}

impl SpyExtractor {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            faces: Vec::new(),
            ocr_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_faces(text: &str, faces: Vec<DetectedFace>) -> Self {
        Self {
            text: text.to_string(),
            faces,
            ocr_calls: AtomicUsize::new(0),
        }
    }

    pub fn ocr_calls(&self) -> usize {
        self.ocr_calls.load(Ordering::SeqCst)
    }
}

impl TextEmbedder for SpyExtractor {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, ExtractError> {
        Ok(embedding_for(text))
    }
}

impl Extractor for SpyExtractor {
    fn extract_text(&self, _image: &DynamicImage) -> Result<String, ExtractError> {
        self.ocr_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }

    fn detect_faces(&self, _image: &DynamicImage) -> Result<Vec<DetectedFace>, ExtractError> {
        Ok(self.faces.clone())
    }
}

/// Embedder that returns one fixed vector for every query.
pub struct FixedEmbedder(pub Vec<f32>);

impl TextEmbedder for FixedEmbedder {
    fn embed_text(&self, _text: &str) -> Result<Vec<f32>, ExtractError> {
        Ok(self.0.clone())
    }
}

/// Deterministic toy embedding: a small byte histogram. Equal texts get
/// equal vectors; unrelated texts usually do not.
pub fn embedding_for(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 8];
    for (i, byte) in text.bytes().enumerate() {
        v[(byte as usize + i) % 8] += 1.0;
    }
    v
}

pub fn solid_png(dir: &Path, name: &str, color: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbaImage::from_pixel(32, 32, image::Rgba(color));
    img.save_with_format(&path, image::ImageFormat::Png).unwrap();
    path
}

pub fn gradient_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbaImage::from_fn(64, 64, |x, _| {
        let v = (x * 4) as u8;
        image::Rgba([v, v, v, 255])
    });
    img.save_with_format(&path, image::ImageFormat::Png).unwrap();
    path
}

pub fn record_with_text(path: &str, text: &str) -> IndexRecord {
    IndexRecord {
        file_path: path.to_string(),
        text: text.to_string(),
        embedding: embedding_for(text),
        ..Default::default()
    }
}
