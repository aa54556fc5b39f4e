//! One tenant's skill managers and dataset catalog.
//!
//! A manager for a skill type exists exactly while the tenant owns at least
//! one persisted skill of that type. Creating the first skill of a type
//! builds its manager; deleting the last one tears it down. Both happen under
//! the session's structure lock, which long-running work (training, deploy,
//! export, import) never holds.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chatskill_types::dataset::DatasetId;
use chatskill_types::error::SkillError;
use chatskill_types::model::{TrainOutcome, TrainRequest};
use chatskill_types::retrieval::{CreateRetrievalSkillRequest, QueryHit, QueryRequest, RetrievalSkill};
use chatskill_types::skill::{SkillId, SkillType, SluTask};
use chatskill_types::slu::{CreateSluSkillRequest, SluResponse, SluSkill};
use chatskill_types::tenant::{Tenant, TenantId};
use tokio::sync::{Mutex, RwLock};

use crate::capability::search::SearchEngine;
use crate::model::manager::{ModelManager, stage_import};
use crate::platform::{Backends, Platform};
use crate::retrieval::dataset::DatasetCatalog;
use crate::retrieval::manager::RetrievalManager;
use crate::skill::{SkillManager, SkillManagerHandle};
use crate::slu::manager::SluManager;
use crate::slu::runtime::run_inference;

pub struct TenantSession<P: Platform> {
    tenant: Tenant,
    backends: Backends<P>,
    managers: RwLock<BTreeMap<SkillType, SkillManagerHandle<P>>>,
    structure: Mutex<()>,
    datasets: DatasetCatalog<P>,
}

impl<P: Platform> TenantSession<P> {
    /// Build a session, rebuilding a manager for every skill type the tenant
    /// has persisted skills of.
    pub async fn load(tenant: Tenant, backends: Backends<P>) -> Result<Self, SkillError> {
        let mut managers = BTreeMap::new();
        for skill_type in SkillType::ALL {
            let count =
                SkillManagerHandle::persisted_count(skill_type, &tenant.id, &backends).await?;
            if count > 0 {
                let handle = SkillManagerHandle::construct(skill_type, &tenant.id, &backends)?;
                managers.insert(skill_type, handle);
            }
        }

        tracing::debug!(
            tenant_id = %tenant.id,
            managers = managers.len(),
            "loaded tenant session"
        );
        Ok(Self {
            datasets: DatasetCatalog::new(tenant.id.clone(), backends.clone()),
            tenant,
            backends,
            managers: RwLock::new(managers),
            structure: Mutex::new(()),
        })
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn id(&self) -> &TenantId {
        &self.tenant.id
    }

    pub fn datasets(&self) -> &DatasetCatalog<P> {
        &self.datasets
    }

    /// Skill types that currently have a manager.
    pub async fn skill_types(&self) -> Vec<SkillType> {
        self.managers.read().await.keys().copied().collect()
    }

    pub async fn manager(&self, skill_type: SkillType) -> Result<SkillManagerHandle<P>, SkillError> {
        self.managers
            .read()
            .await
            .get(&skill_type)
            .cloned()
            .ok_or_else(|| self.missing(skill_type))
    }

    pub async fn retrieval(&self) -> Result<Arc<RetrievalManager<P>>, SkillError> {
        self.manager(SkillType::Retrieve)
            .await?
            .as_retrieval()
            .cloned()
            .ok_or_else(|| self.missing(SkillType::Retrieve))
    }

    pub async fn slu(&self) -> Result<Arc<SluManager<P>>, SkillError> {
        self.manager(SkillType::Slu)
            .await?
            .as_slu()
            .cloned()
            .ok_or_else(|| self.missing(SkillType::Slu))
    }

    pub async fn models(&self) -> Result<Arc<ModelManager<P>>, SkillError> {
        self.manager(SkillType::ModelManager)
            .await?
            .as_model()
            .cloned()
            .ok_or_else(|| self.missing(SkillType::ModelManager))
    }

    /// Register a manager. An existing manager of the same type wins and is
    /// returned.
    pub async fn add_skill_manager(&self, handle: SkillManagerHandle<P>) -> SkillManagerHandle<P> {
        self.managers
            .write()
            .await
            .entry(handle.skill_type())
            .or_insert(handle)
            .clone()
    }

    /// Remove the manager of `skill_type`. Only allowed once it owns no
    /// skills.
    pub async fn delete_skill_manager(&self, skill_type: SkillType) -> Result<(), SkillError> {
        let _guard = self.structure.lock().await;
        let handle = self.manager(skill_type).await?;
        let count = handle.skill_count().await?;
        if count > 0 {
            return Err(SkillError::Validation(format!(
                "{skill_type} manager still owns {count} skills"
            )));
        }
        handle.release();
        self.managers.write().await.remove(&skill_type);
        tracing::info!(tenant_id = %self.tenant.id, %skill_type, "removed skill manager");
        Ok(())
    }

    // -- creation -----------------------------------------------------------

    pub async fn create_retrieval_skill(
        &self,
        request: CreateRetrievalSkillRequest,
    ) -> Result<RetrievalSkill, SkillError> {
        let _guard = self.structure.lock().await;
        let handle = self.ensure_manager(SkillType::Retrieve).await?;
        let manager = handle
            .as_retrieval()
            .ok_or_else(|| self.missing(SkillType::Retrieve))?;
        let created = manager.create_skill(request).await;
        if created.is_err() {
            self.teardown_if_empty(SkillType::Retrieve).await;
        }
        created
    }

    pub async fn create_slu_skill(
        &self,
        request: CreateSluSkillRequest,
    ) -> Result<SluSkill, SkillError> {
        let _guard = self.structure.lock().await;
        let handle = self.ensure_manager(SkillType::Slu).await?;
        let manager = handle.as_slu().ok_or_else(|| self.missing(SkillType::Slu))?;
        let created = manager.create_skill(request).await;
        if created.is_err() {
            self.teardown_if_empty(SkillType::Slu).await;
        }
        created
    }

    /// Persist a model and train it. The row is created under the structure
    /// lock; training runs outside it. A failed training keeps the row.
    pub async fn train_model(&self, request: TrainRequest) -> Result<TrainOutcome, SkillError> {
        let (manager, model) = {
            let _guard = self.structure.lock().await;
            let manager = self.ensure_model_manager().await?;
            match manager.create_skill(request).await {
                Ok(model) => (manager, model),
                Err(e) => {
                    self.teardown_if_empty(SkillType::ModelManager).await;
                    return Err(e);
                }
            }
        };
        manager.train(&model.id).await
    }

    /// Train an existing model again from its stored request.
    pub async fn retrain_model(&self, model_id: &SkillId) -> Result<TrainOutcome, SkillError> {
        self.models().await?.train(model_id).await
    }

    pub async fn export_model(&self, model_id: &SkillId) -> Result<std::path::PathBuf, SkillError> {
        self.models().await?.export(model_id).await
    }

    /// Register an exported model archive as a new model serving `skill_id`.
    pub async fn import_model(
        &self,
        archive: &Path,
        skill_id: &SkillId,
    ) -> Result<TrainOutcome, SkillError> {
        let staged = stage_import(&self.backends, archive, skill_id).await?;

        let created = {
            let _guard = self.structure.lock().await;
            match self.ensure_model_manager().await {
                Ok(manager) => match manager.create_skill(staged.request.clone()).await {
                    Ok(model) => Ok((manager, model)),
                    Err(e) => {
                        self.teardown_if_empty(SkillType::ModelManager).await;
                        Err(e)
                    }
                },
                Err(e) => Err(e),
            }
        };
        let (manager, model) = match created {
            Ok(created) => created,
            Err(e) => {
                staged.discard().await;
                return Err(e);
            }
        };

        let outcome = manager.restore(&model.id, staged).await?;
        tracing::info!(
            tenant_id = %self.tenant.id,
            model_id = %model.id,
            archive = %archive.display(),
            "imported model"
        );
        Ok(outcome)
    }

    // -- deletion -----------------------------------------------------------

    /// Delete a skill, tearing down its manager if it was the last one.
    pub async fn delete_skill(&self, skill_type: SkillType, id: &SkillId) -> Result<(), SkillError> {
        let handle = self.manager(skill_type).await?;
        handle.delete_skill(id).await?;

        let _guard = self.structure.lock().await;
        self.teardown_if_empty(skill_type).await;
        Ok(())
    }

    /// Delete a dataset and unmount it from every retrieval skill.
    pub async fn delete_dataset(&self, id: &DatasetId) -> Result<Vec<SkillId>, SkillError> {
        let affected = self.datasets.delete(id).await?;
        if let Ok(retrieval) = self.retrieval().await {
            retrieval.detach_dataset(id, &affected).await;
        }
        Ok(affected)
    }

    /// Delete every skill and dataset, releasing their external resources.
    pub async fn purge(&self) -> Result<(), SkillError> {
        let _guard = self.structure.lock().await;
        let handles: Vec<SkillManagerHandle<P>> =
            self.managers.read().await.values().cloned().collect();
        for handle in handles {
            for id in handle.skill_ids().await? {
                handle.delete_skill(&id).await?;
            }
            handle.release();
        }
        self.managers.write().await.clear();

        for dataset in self.datasets.list().await? {
            self.datasets.delete(&dataset.id).await?;
        }
        tracing::info!(tenant_id = %self.tenant.id, "purged tenant resources");
        Ok(())
    }

    // -- retrieval ----------------------------------------------------------

    pub async fn mount_datasets(
        &self,
        skill_id: &SkillId,
        dataset_ids: &[DatasetId],
    ) -> Result<Vec<DatasetId>, SkillError> {
        self.retrieval()
            .await?
            .get_skill(skill_id)
            .await?
            .mount(dataset_ids)
            .await
    }

    pub async fn deploy_retrieval(&self, skill_id: &SkillId) -> Result<RetrievalSkill, SkillError> {
        self.retrieval().await?.get_skill(skill_id).await?.deploy().await
    }

    pub async fn query_retrieval(
        &self,
        skill_id: &SkillId,
        request: &QueryRequest,
    ) -> Result<Vec<QueryHit>, SkillError> {
        self.retrieval()
            .await?
            .get_skill(skill_id)
            .await?
            .query(request)
            .await
    }

    // -- SLU ----------------------------------------------------------------

    /// Deploy a model to an SLU skill, serving `task` or else the model's own
    /// task. Needs both the SLU and the model manager.
    pub async fn deploy_slu_model(
        &self,
        slu_id: &SkillId,
        model_id: &SkillId,
        task: Option<SluTask>,
    ) -> Result<SluSkill, SkillError> {
        let slu = self.slu().await?;
        let models = self.models().await?;
        let model = models.get_certain_skill(model_id).await?;
        let runtime = slu.get_skill(slu_id).await?;
        runtime
            .deploy_model(&model, task.unwrap_or(model.task))
            .await
    }

    pub async fn deploy_term_index(
        &self,
        slu_id: &SkillId,
        index_name: &str,
    ) -> Result<SluSkill, SkillError> {
        self.slu()
            .await?
            .get_skill(slu_id)
            .await?
            .deploy_term_index(index_name)
            .await
    }

    pub async fn slu_inference(
        &self,
        slu_id: &SkillId,
        question: &str,
        use_correction: bool,
    ) -> Result<SluResponse, SkillError> {
        let slu = self.slu().await?;
        let models = self.models().await?;
        let runtime = slu.get_skill(slu_id).await?;
        let model_id = runtime.record().await.deployed_model_id.ok_or_else(|| {
            SkillError::Undeployed(format!("SLU skill {slu_id} has no deployed model"))
        })?;
        let model = models.load_model(&model_id).await?;
        runtime
            .inference(model.as_ref(), question, use_correction)
            .await
    }

    /// Run inference against a model directly, without an SLU skill.
    pub async fn test_model(
        &self,
        model_id: &SkillId,
        question: &str,
        use_correction: bool,
        term_index: Option<&str>,
    ) -> Result<SluResponse, SkillError> {
        let models = self.models().await?;
        let record = models.get_certain_skill(model_id).await?;
        if let Some(name) = term_index
            && !self.backends.search.index_exists(name).await?
        {
            return Err(SkillError::NotFound(format!("term index {name}")));
        }
        let model = models.load_model(model_id).await?;
        run_inference(
            &self.backends,
            model.as_ref(),
            record.task,
            term_index,
            question,
            use_correction,
        )
        .await
    }

    // -- internals ----------------------------------------------------------

    fn missing(&self, skill_type: SkillType) -> SkillError {
        SkillError::ManagerMissing {
            tenant: self.tenant.id.clone(),
            skill_type,
        }
    }

    /// The manager of `skill_type`, built if absent. Caller holds the
    /// structure lock.
    async fn ensure_manager(&self, skill_type: SkillType) -> Result<SkillManagerHandle<P>, SkillError> {
        if let Some(handle) = self.managers.read().await.get(&skill_type) {
            return Ok(handle.clone());
        }
        let handle = SkillManagerHandle::construct(skill_type, &self.tenant.id, &self.backends)?;
        tracing::info!(tenant_id = %self.tenant.id, %skill_type, "created skill manager");
        Ok(self.add_skill_manager(handle).await)
    }

    async fn ensure_model_manager(&self) -> Result<Arc<ModelManager<P>>, SkillError> {
        self.ensure_manager(SkillType::ModelManager)
            .await?
            .as_model()
            .cloned()
            .ok_or_else(|| self.missing(SkillType::ModelManager))
    }

    /// Drop the manager of `skill_type` if it owns no skills. Caller holds
    /// the structure lock.
    async fn teardown_if_empty(&self, skill_type: SkillType) {
        let Some(handle) = self.managers.read().await.get(&skill_type).cloned() else {
            return;
        };
        match handle.skill_count().await {
            Ok(0) => {
                handle.release();
                self.managers.write().await.remove(&skill_type);
                tracing::info!(tenant_id = %self.tenant.id, %skill_type, "removed empty skill manager");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(tenant_id = %self.tenant.id, %skill_type, "could not count skills: {e}");
            }
        }
    }
}
