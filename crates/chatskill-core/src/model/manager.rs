//! Model skill manager.
//!
//! Besides the skill runtimes it caches loaded SLU models per model id, so
//! inference loads each artifact once. Training and restore evict that
//! entry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatskill_types::error::SkillError;
use chatskill_types::model::{ModelManifest, ModelSkill, TrainOutcome, TrainRequest};
use chatskill_types::skill::{SkillId, SkillType};
use chatskill_types::tenant::TenantId;
use chrono::Utc;
use uuid::Uuid;

use super::experiment_namespace;
use super::runtime::ModelSkillRuntime;
use crate::capability::archive::ModelArchiver;
use crate::capability::slu_model::SluModelLoader;
use crate::capability::tracker::ExperimentTracker;
use crate::platform::{Backends, Platform};
use crate::repository::model::ModelSkillRepository;
use crate::skill::SkillManager;
use crate::skill::cache::RuntimeCache;

/// Loaded model type of a platform.
pub type LoadedModel<P> = <<P as Platform>::Loader as SluModelLoader>::Model;

/// An unpacked archive waiting to be registered as a new model.
pub struct StagedImport {
    pub request: TrainRequest,
    pub manifest: ModelManifest,
    pub artifact_dir: PathBuf,
}

/// Unpack an exported archive and rebuild its training request so it
/// targets `skill_id`.
pub async fn stage_import<P: Platform>(
    backends: &Backends<P>,
    archive: &Path,
    skill_id: &SkillId,
) -> Result<StagedImport, SkillError> {
    if !tokio::fs::try_exists(archive).await.unwrap_or(false) {
        return Err(SkillError::NotFound(format!(
            "model archive {}",
            archive.display()
        )));
    }

    let staging = backends.import_dir(&Uuid::now_v7().simple().to_string());
    let manifest = backends
        .archiver
        .unpack(archive, &staging)
        .await
        .map_err(|e| SkillError::Validation(format!("invalid model archive: {e}")))?;

    let mut request = manifest.original_request.clone();
    request.skill_type = SkillType::Slu;
    request.skill_id = skill_id.clone();
    request.task = manifest.task;

    Ok(StagedImport {
        request,
        manifest,
        artifact_dir: staging,
    })
}

impl StagedImport {
    /// Remove the unpacked files.
    pub async fn discard(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.artifact_dir).await {
            tracing::debug!(path = %self.artifact_dir.display(), "could not clean import staging: {e}");
        }
    }
}

pub struct ModelManager<P: Platform> {
    tenant_id: TenantId,
    namespace: String,
    backends: Backends<P>,
    cache: RuntimeCache<SkillId, ModelSkillRuntime<P>>,
    loaded: RuntimeCache<SkillId, LoadedModel<P>>,
}

impl<P: Platform> ModelManager<P> {
    pub fn new(tenant_id: TenantId, backends: Backends<P>) -> Self {
        Self {
            namespace: experiment_namespace(&tenant_id),
            tenant_id,
            backends,
            cache: RuntimeCache::new(),
            loaded: RuntimeCache::new(),
        }
    }

    /// Tracker namespace of this tenant's runs.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn load_record(&self, id: &SkillId) -> Result<ModelSkill, SkillError> {
        match self.backends.models.get_by_id(id).await? {
            Some(model) if model.tenant_id == self.tenant_id => Ok(model),
            _ => Err(SkillError::NotFound(format!("model {id}"))),
        }
    }

    /// Train (or retrain) a model from its stored request.
    pub async fn train(&self, id: &SkillId) -> Result<TrainOutcome, SkillError> {
        let runtime = self.get_skill(id).await?;
        let record = runtime.record().await;
        let request = record.original_request;
        let outcome = runtime
            .train(request.train_data, request.eval_data, record.args)
            .await?;
        self.loaded.evict(id);
        Ok(outcome)
    }

    /// The loaded SLU model for `id`, loading its artifact on first use.
    pub async fn load_model(&self, id: &SkillId) -> Result<Arc<LoadedModel<P>>, SkillError> {
        let runtime = self.get_skill(id).await?;
        self.loaded
            .get_or_init(id, || async {
                let path = runtime.artifact_path().await?;
                tracing::debug!(model_id = %id, path = %path.display(), "loading model artifact");
                Ok(self.backends.loader.load(&path).await?)
            })
            .await
    }

    pub async fn export(&self, id: &SkillId) -> Result<PathBuf, SkillError> {
        self.get_skill(id).await?.export().await
    }

    /// Attach a staged artifact to a model created from its request.
    pub async fn restore(
        &self,
        id: &SkillId,
        staged: StagedImport,
    ) -> Result<TrainOutcome, SkillError> {
        let runtime = self.get_skill(id).await?;
        let outcome = runtime
            .restore(staged.manifest.clone(), &staged.artifact_dir)
            .await;
        staged.discard().await;
        self.loaded.evict(id);
        outcome
    }
}

impl<P: Platform> SkillManager for ModelManager<P> {
    type Input = TrainRequest;
    type Record = ModelSkill;
    type Runtime = ModelSkillRuntime<P>;

    fn skill_type(&self) -> SkillType {
        SkillType::ModelManager
    }

    async fn create_skill(&self, input: TrainRequest) -> Result<ModelSkill, SkillError> {
        input.validate().map_err(SkillError::Validation)?;

        let args = input
            .args
            .clone()
            .unwrap_or_else(|| self.backends.config.training.default_args.clone());
        let model = ModelSkill {
            id: SkillId::new(),
            tenant_id: self.tenant_id.clone(),
            task: input.task,
            skill_type: input.skill_type,
            skill_id: input.skill_id.clone(),
            args,
            original_request: input,
            run_id: None,
            artifact_uri: None,
            metrics: Default::default(),
            created_at: Utc::now(),
        };
        let created = self.backends.models.create(&model).await?;
        tracing::info!(
            tenant_id = %self.tenant_id,
            model_id = %created.id,
            task = %created.task,
            "created model skill"
        );
        Ok(created)
    }

    async fn get_skill(&self, id: &SkillId) -> Result<Arc<ModelSkillRuntime<P>>, SkillError> {
        self.cache
            .get_or_init(id, || async {
                let record = self.load_record(id).await?;
                Ok(ModelSkillRuntime::new(
                    record,
                    self.namespace.clone(),
                    self.backends.clone(),
                    self.cache.lock_handle(id),
                ))
            })
            .await
    }

    async fn delete_skill(&self, id: &SkillId) -> Result<(), SkillError> {
        self.load_record(id).await?;
        let lock = self.cache.lock_handle(id);
        let guard = lock.lock().await;

        // Re-read under the lock so a run recorded by a concurrent train is
        // not left behind.
        let record = self.load_record(id).await?;
        self.backends.models.delete(id).await?;
        self.cache.evict(id);
        self.loaded.evict(id);
        drop(guard);

        if let Some(run_id) = &record.run_id
            && let Err(e) = self.backends.tracker.delete_run(run_id).await
        {
            tracing::warn!(model_id = %id, run_id = %run_id, "failed to delete tracked run: {e}");
        }
        tracing::info!(tenant_id = %self.tenant_id, model_id = %id, "deleted model skill");
        Ok(())
    }

    async fn get_all_skills(&self) -> Result<Vec<ModelSkill>, SkillError> {
        Ok(self.backends.models.list_by_tenant(&self.tenant_id).await?)
    }

    async fn get_certain_skill(&self, id: &SkillId) -> Result<ModelSkill, SkillError> {
        match self.cache.get(id) {
            Some(runtime) => Ok(runtime.record().await),
            None => self.load_record(id).await,
        }
    }

    async fn skill_count(&self) -> Result<i64, SkillError> {
        Ok(self.backends.models.count_by_tenant(&self.tenant_id).await?)
    }

    fn release(&self) {
        self.cache.clear();
        self.loaded.clear();
    }
}
