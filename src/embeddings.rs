//! Embedding model wrapper for fastembed.
//!
//! One model instance serves both sides of the semantic tier: OCR text is
//! embedded at index time and queries are embedded at search time, so both
//! live in the same vector space.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{InitOptions, TextEmbedding};

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

impl EmbeddingModel {
    /// Create a new embedding model with the given name.
    ///
    /// The model is downloaded on first use and cached in the `models/`
    /// subdirectory of `cache_dir`.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let model_enum = Self::parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    pub fn name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Generate an embedding for a single text.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" | "allminiml6v2q" => {
                Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q)
            }
            "bge-small-en-v1.5" | "bgesmallenv15" => {
                Ok(fastembed::EmbeddingModel::BGESmallENV15)
            }
            "bge-small-en-v1.5-q" | "bgesmallenv15q" => {
                Ok(fastembed::EmbeddingModel::BGESmallENV15Q)
            }
            "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-base-en-v1.5-q" | "bgebaseenv15q" => {
                Ok(fastembed::EmbeddingModel::BGEBaseENV15Q)
            }
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5 (add -q suffix for quantized)",
                name
            ))),
        }
    }

    /// Probe the model to determine embedding dimensions.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let test_embeddings = model.embed(vec!["test"], None).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e))
        })?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_model_name() {
        let temp_dir = std::env::temp_dir().join("snapscout-embed-invalid");
        let result = EmbeddingModel::new("nonexistent-model", temp_dir);
        assert!(matches!(result, Err(EmbeddingError::InvalidModel(_))));
    }

    // Integration tests require model download - run with --ignored
    #[test]
    #[ignore = "requires model download"]
    fn test_model_creation() {
        let temp_dir = std::env::temp_dir().join("snapscout-embed-test");
        let model = EmbeddingModel::new("all-MiniLM-L6-v2", temp_dir.clone());
        assert!(model.is_ok());

        let model = model.unwrap();
        assert_eq!(model.name(), "all-MiniLM-L6-v2");
        assert_eq!(model.dimensions(), 384); // MiniLM produces 384-dim embeddings

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embedding_generation() {
        let temp_dir = std::env::temp_dir().join("snapscout-embed-test-gen");
        let model = EmbeddingModel::new("all-MiniLM-L6-v2", temp_dir.clone()).unwrap();

        let embedding = model.embed("receipt from the hardware store").unwrap();
        assert_eq!(embedding.len(), 384);

        // Check that values are normalized (L2 norm ~= 1)
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }
}
