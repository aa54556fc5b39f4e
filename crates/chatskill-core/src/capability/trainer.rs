//! Trainer trait.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chatskill_types::error::RepositoryError;
use chatskill_types::model::{TrainingArgs, TrainingExample};
use chatskill_types::skill::SluTask;

/// Input for one training attempt.
#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub task: SluTask,
    pub train: Vec<TrainingExample>,
    pub eval: Vec<TrainingExample>,
    pub args: TrainingArgs,
    /// Fresh directory the trainer writes the artifact into.
    pub output_dir: PathBuf,
}

/// A finished training attempt.
#[derive(Debug, Clone)]
pub struct TrainedArtifact {
    pub artifact_dir: PathBuf,
    pub metrics: BTreeMap<String, f64>,
}

/// Runs training to completion. Long-running; not cancellable.
pub trait Trainer: Send + Sync {
    fn train(
        &self,
        job: &TrainingJob,
    ) -> impl std::future::Future<Output = Result<TrainedArtifact, RepositoryError>> + Send;
}
