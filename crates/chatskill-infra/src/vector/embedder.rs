//! FastEmbed-based local text encoder.
//!
//! Implements the `Encoder` port from `chatskill-core` with ONNX runtime
//! inference. Model weights are downloaded into the cache directory on first
//! use.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chatskill_core::capability::encoder::Encoder;
use chatskill_types::config::EmbeddingConfig;
use chatskill_types::error::RepositoryError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::OnceCell;

/// Supported model names and their output dimensions.
pub fn resolve_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    match name.trim().to_lowercase().as_str() {
        "multilingual-e5-base" => Some((EmbeddingModel::MultilingualE5Base, 768)),
        "multilingual-e5-small" => Some((EmbeddingModel::MultilingualE5Small, 384)),
        "bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384)),
        "all-minilm-l6-v2" => Some((EmbeddingModel::AllMiniLML6V2, 384)),
        _ => None,
    }
}

/// Encoder backed by a fastembed ONNX model.
///
/// The model is loaded on first use, so commands that never embed do not pay
/// for (or trigger) the download.
pub struct FastEmbedEncoder {
    variant: EmbeddingModel,
    cache_dir: PathBuf,
    model: OnceCell<Arc<Mutex<TextEmbedding>>>,
    model_name: String,
    dimension: usize,
    batch_size: usize,
}

impl FastEmbedEncoder {
    /// Resolve the configured model. Weights are cached under `cache_dir`.
    pub fn new(
        config: &EmbeddingConfig,
        cache_dir: PathBuf,
        batch_size: usize,
    ) -> Result<Self, RepositoryError> {
        let (variant, dimension) = resolve_model(&config.model).ok_or_else(|| {
            RepositoryError::Query(format!("unsupported embedding model: {}", config.model))
        })?;
        if config.dimension != dimension {
            tracing::warn!(
                model = %config.model,
                configured = config.dimension,
                actual = dimension,
                "configured embedding dimension does not match the model; using the model's"
            );
        }

        Ok(Self {
            variant,
            cache_dir,
            model: OnceCell::new(),
            model_name: config.model.clone(),
            dimension,
            batch_size: batch_size.max(1),
        })
    }

    async fn model(&self) -> Result<Arc<Mutex<TextEmbedding>>, RepositoryError> {
        self.model
            .get_or_try_init(|| async {
                let options = InitOptions::new(self.variant.clone())
                    .with_cache_dir(self.cache_dir.clone())
                    .with_show_download_progress(false);
                let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(options))
                    .await
                    .map_err(|e| RepositoryError::Query(format!("embedding model task failed: {e}")))?
                    .map_err(|e| RepositoryError::Query(format!("failed to load embedding model: {e}")))?;
                tracing::info!(model = %self.model_name, dimension = self.dimension, "loaded embedding model");
                Ok(Arc::new(Mutex::new(model)))
            })
            .await
            .cloned()
    }
}

impl Encoder for FastEmbedEncoder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        let texts = texts.to_vec();
        let batch_size = self.batch_size;
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| RepositoryError::Query("embedding model lock poisoned".to_string()))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| RepositoryError::Query(format!("embedding failed: {e}")))
        })
        .await
        .map_err(|e| RepositoryError::Query(format!("embedding task failed: {e}")))?
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_names() {
        assert_eq!(resolve_model("multilingual-e5-base").map(|(_, d)| d), Some(768));
        assert_eq!(resolve_model(" BGE-small-en-v1.5 ").map(|(_, d)| d), Some(384));
        assert!(resolve_model("gpt-4").is_none());
    }

    #[test]
    fn test_unsupported_model_is_rejected() {
        let config = EmbeddingConfig {
            model: "unknown-model".to_string(),
            ..EmbeddingConfig::default()
        };
        let result = FastEmbedEncoder::new(&config, PathBuf::from("/tmp/models"), 32);
        assert!(matches!(result, Err(RepositoryError::Query(_))));
    }

    #[tokio::test]
    async fn test_construction_is_lazy_and_empty_input_skips_loading() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig {
            model: "bge-small-en-v1.5".to_string(),
            dimension: 768,
            cache_dir: None,
        };
        let encoder = FastEmbedEncoder::new(&config, dir.path().to_path_buf(), 0).unwrap();
        assert_eq!(encoder.dimension(), 384);
        assert_eq!(encoder.model_name(), "bge-small-en-v1.5");
        assert!(encoder.embed(&[]).await.unwrap().is_empty());
        assert!(encoder.model.get().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
