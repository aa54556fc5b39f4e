//! Loaded SLU models.

use std::path::Path;

use chatskill_types::error::RepositoryError;
use chatskill_types::skill::SluTask;
use chatskill_types::slu::SluPrediction;

/// A model ready for inference. Shared read-only across concurrent calls.
pub trait SluModel: Send + Sync {
    fn task(&self) -> SluTask;

    /// Predict intents (best `top_k`) and slots for `text`.
    fn predict(
        &self,
        text: &str,
        top_k: usize,
    ) -> impl std::future::Future<Output = Result<SluPrediction, RepositoryError>> + Send;
}

/// Turns a trained artifact directory into a [`SluModel`].
pub trait SluModelLoader: Send + Sync {
    type Model: SluModel + 'static;

    fn load(
        &self,
        artifact_dir: &Path,
    ) -> impl std::future::Future<Output = Result<Self::Model, RepositoryError>> + Send;
}
