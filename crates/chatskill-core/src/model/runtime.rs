//! A materialized model skill: train, export, restore.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatskill_types::error::SkillError;
use chatskill_types::model::{
    ModelManifest, ModelSkill, TrainOutcome, TrainingArgs, TrainingExample, archive_file_name,
};
use chatskill_types::skill::SkillId;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::holdout::stratified_split;
use crate::capability::archive::ModelArchiver;
use crate::capability::tracker::ExperimentTracker;
use crate::capability::trainer::{Trainer, TrainingJob};
use crate::platform::{Backends, Platform};
use crate::repository::model::ModelSkillRepository;

pub struct ModelSkillRuntime<P: Platform> {
    id: SkillId,
    record: RwLock<ModelSkill>,
    lock: Arc<Mutex<()>>,
    namespace: String,
    backends: Backends<P>,
}

impl<P: Platform> ModelSkillRuntime<P> {
    pub fn new(
        record: ModelSkill,
        namespace: String,
        backends: Backends<P>,
        lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            id: record.id.clone(),
            record: RwLock::new(record),
            lock,
            namespace,
            backends,
        }
    }

    pub fn id(&self) -> &SkillId {
        &self.id
    }

    pub async fn record(&self) -> ModelSkill {
        self.record.read().await.clone()
    }

    /// Train on `train`, holding out part of it when `eval` is `None`.
    ///
    /// On trainer failure the row is left untouched, so a later attempt on
    /// the same id may succeed.
    pub async fn train(
        &self,
        train: Vec<TrainingExample>,
        eval: Option<Vec<TrainingExample>>,
        args: TrainingArgs,
    ) -> Result<TrainOutcome, SkillError> {
        let _guard = self.lock.lock().await;
        let task = self.record.read().await.task;

        let (train, eval) = match eval {
            Some(eval) => (train, eval),
            None => stratified_split(&train, self.backends.config.training.holdout_ratio),
        };

        let attempt = Uuid::now_v7().simple().to_string();
        let job = TrainingJob {
            task,
            train,
            eval,
            args: args.clone(),
            output_dir: self.backends.training_dir(&self.id, &attempt),
        };

        tracing::info!(
            model_id = %self.id,
            %task,
            train_size = job.train.len(),
            eval_size = job.eval.len(),
            "training model"
        );
        let artifact = self
            .backends
            .trainer
            .train(&job)
            .await
            .map_err(|e| SkillError::TrainingFailed(e.to_string()))?;

        let mut params = args.to_params();
        params.insert("train_size".to_string(), job.train.len().to_string());
        params.insert("eval_size".to_string(), job.eval.len().to_string());

        let record = self.record.read().await.clone();
        let tags = BTreeMap::from([
            ("task".to_string(), record.task.to_string()),
            ("skill_type".to_string(), record.skill_type.to_string()),
            ("skill_id".to_string(), record.skill_id.to_string()),
            ("tenant".to_string(), record.tenant_id.to_string()),
        ]);

        let outcome = self
            .track_run(params, artifact.metrics, tags, &artifact.artifact_dir)
            .await?;

        if let Err(e) = tokio::fs::remove_dir_all(&job.output_dir).await {
            tracing::debug!(model_id = %self.id, "could not clean training output: {e}");
        }
        Ok(outcome)
    }

    /// Local path of the trained artifact.
    pub async fn artifact_path(&self) -> Result<PathBuf, SkillError> {
        let run_id = self.trained_run_id().await?;
        Ok(self.backends.tracker.get_artifact(&run_id).await?)
    }

    /// Package the artifact with its run metadata into `model_{id}.json.gz`.
    pub async fn export(&self) -> Result<PathBuf, SkillError> {
        let _guard = self.lock.lock().await;
        let run_id = self.trained_run_id().await?;
        let record = self.record.read().await.clone();

        let run = self.backends.tracker.get_run(&run_id).await?;
        let tags = self.backends.tracker.list_tags(&run_id).await?;
        let artifact_dir = self.backends.tracker.get_artifact(&run_id).await?;

        let manifest = ModelManifest {
            model_id: record.id.clone(),
            task: record.task,
            params: run.params,
            metrics: run.metrics,
            tags,
            original_request: record.original_request,
        };

        let export_dir = self.backends.export_dir();
        tokio::fs::create_dir_all(&export_dir)
            .await
            .map_err(|e| SkillError::Storage(format!("create {}: {e}", export_dir.display())))?;
        let dest = export_dir.join(archive_file_name(&record.id));
        self.backends
            .archiver
            .pack(&manifest, &artifact_dir, &dest)
            .await?;

        tracing::info!(model_id = %record.id, archive = %dest.display(), "exported model");
        Ok(dest)
    }

    /// Record an imported artifact under a new run, reproducing the
    /// manifest's params, metrics, and tags exactly.
    pub async fn restore(
        &self,
        manifest: ModelManifest,
        artifact_dir: &Path,
    ) -> Result<TrainOutcome, SkillError> {
        let _guard = self.lock.lock().await;
        self.track_run(
            manifest.params,
            manifest.metrics,
            manifest.tags,
            artifact_dir,
        )
        .await
    }

    async fn track_run(
        &self,
        params: BTreeMap<String, String>,
        metrics: BTreeMap<String, f64>,
        tags: BTreeMap<String, String>,
        artifact_dir: &Path,
    ) -> Result<TrainOutcome, SkillError> {
        let tracker = &self.backends.tracker;
        let run_id = tracker
            .create_run(&self.namespace, &self.id.to_string())
            .await?;
        tracker.log_params(&run_id, &params).await?;
        tracker.log_metrics(&run_id, &metrics).await?;
        tracker.set_tags(&run_id, &tags).await?;
        let artifact_uri = tracker.log_artifacts(&run_id, artifact_dir).await?;

        let mut updated = self.record.read().await.clone();
        let previous_run = updated.run_id.replace(run_id.clone());
        updated.artifact_uri = Some(artifact_uri);
        updated.metrics = metrics;
        let updated = self.backends.models.update(&updated).await?;
        *self.record.write().await = updated.clone();

        if let Some(previous) = previous_run
            && let Err(e) = tracker.delete_run(&previous).await
        {
            tracing::warn!(model_id = %self.id, run_id = %previous, "failed to delete superseded run: {e}");
        }

        let save_path = tracker.get_artifact(&run_id).await?;
        tracing::info!(model_id = %self.id, run_id = %run_id, "recorded model run");
        Ok(TrainOutcome {
            model: updated,
            save_path,
            tracking_uri: tracker.tracking_uri(),
            run_id,
        })
    }

    async fn trained_run_id(&self) -> Result<String, SkillError> {
        let record = self.record.read().await;
        match (&record.run_id, &record.artifact_uri) {
            (Some(run_id), Some(_)) => Ok(run_id.clone()),
            _ => Err(SkillError::Undeployed(format!(
                "model {} has not been trained",
                record.id
            ))),
        }
    }
}
