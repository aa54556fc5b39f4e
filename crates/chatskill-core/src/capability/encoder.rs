//! Encoder trait for text-to-vector conversion.

use chatskill_types::error::RepositoryError;

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Encoder: Send + Sync {
    /// Embed one or more texts. Returns one vector per input, in order, each
    /// of length [`Encoder::dimension`].
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, RepositoryError>> + Send;

    /// The model name used for embeddings (e.g., "multilingual-e5-base").
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;
}
