//! Configuration types for chatskill.
//!
//! `ChatskillConfig` mirrors `config.toml` in the data directory. Every
//! section and field is optional; missing values take the defaults below.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::TrainingArgs;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatskillConfig {
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub training: TrainingConfig,
    pub slu: SluConfig,
}

/// Hybrid retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Lexical score that maps to a normalized lexical score of 1.0.
    ///
    /// Lexical scores are BM25 averaged over the query's trigrams, so they
    /// sit on the scale of a single trigram's IDF: about 2.6 for a trigram
    /// unique to one of 20 entries, 4.2 for one of 100. Normalization is
    /// min-max over the fixed range `[0, ceiling]`, clamped, so a score means
    /// the same thing across queries.
    pub lexical_normalization_ceiling: f32,
    /// Candidates fetched from each side before fusion (at least `top_k`).
    pub candidate_pool: usize,
    /// Upper bound on a sentence segment, in characters.
    pub segment_max_chars: usize,
    /// Texts per encoder call while deploying.
    pub embed_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lexical_normalization_ceiling: 4.0,
            candidate_pool: 50,
            segment_max_chars: 120,
            embed_batch_size: 32,
        }
    }
}

/// Text encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
    /// Where model weights are cached; defaults to `{data_dir}/models`.
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "multilingual-e5-base".to_string(),
            dimension: 768,
            cache_dir: None,
        }
    }
}

/// Model training settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of each intent group held out for evaluation when no eval set
    /// is supplied.
    pub holdout_ratio: f64,
    /// Arguments used when a request leaves them unset.
    pub default_args: TrainingArgs,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout_ratio: 0.2,
            default_args: TrainingArgs::default(),
        }
    }
}

/// SLU inference settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SluConfig {
    /// Intents returned per inference.
    pub inference_top_k: usize,
    /// Minimum edit similarity for the correction pass to replace text.
    pub correction_min_similarity: f32,
    /// Term index hits considered per correction pass.
    pub correction_candidates: usize,
}

impl Default for SluConfig {
    fn default() -> Self {
        Self {
            inference_top_k: 1,
            correction_min_similarity: 0.6,
            correction_candidates: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = ChatskillConfig::default();
        assert_eq!(config.retrieval.lexical_normalization_ceiling, 4.0);
        assert_eq!(config.retrieval.candidate_pool, 50);
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.training.holdout_ratio, 0.2);
        assert_eq!(config.slu.inference_top_k, 1);
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: ChatskillConfig = toml::from_str("").unwrap();
        assert_eq!(config, ChatskillConfig::default());
    }

    #[test]
    fn test_config_deserialize_partial_sections() {
        let toml_str = r#"
[retrieval]
lexical_normalization_ceiling = 10.0

[training]
holdout_ratio = 0.25

[training.default_args]
epoch = 4
"#;
        let config: ChatskillConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retrieval.lexical_normalization_ceiling, 10.0);
        assert_eq!(config.retrieval.candidate_pool, 50);
        assert_eq!(config.training.holdout_ratio, 0.25);
        assert_eq!(config.training.default_args.epoch, 4);
        assert_eq!(config.training.default_args.train_batch_size, 16);
        assert_eq!(config.embedding.model, "multilingual-e5-base");
    }
}
