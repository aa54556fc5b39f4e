//! Retrieval skill manager.

use std::sync::Arc;

use chatskill_types::dataset::DatasetId;
use chatskill_types::error::SkillError;
use chatskill_types::retrieval::{CreateRetrievalSkillRequest, RetrievalSkill};
use chatskill_types::skill::{SkillId, SkillType};
use chatskill_types::tenant::TenantId;
use chrono::Utc;

use super::runtime::RetrievalSkillRuntime;
use crate::capability::vector::VectorIndex;
use crate::platform::{Backends, Platform};
use crate::repository::retrieval::RetrievalSkillRepository;
use crate::skill::SkillManager;
use crate::skill::cache::RuntimeCache;

pub struct RetrievalManager<P: Platform> {
    tenant_id: TenantId,
    backends: Backends<P>,
    cache: RuntimeCache<SkillId, RetrievalSkillRuntime<P>>,
}

impl<P: Platform> RetrievalManager<P> {
    pub fn new(tenant_id: TenantId, backends: Backends<P>) -> Self {
        Self {
            tenant_id,
            backends,
            cache: RuntimeCache::new(),
        }
    }

    async fn load_record(&self, id: &SkillId) -> Result<RetrievalSkill, SkillError> {
        match self.backends.retrievals.get_by_id(id).await? {
            Some(skill) if skill.tenant_id == self.tenant_id => Ok(skill),
            _ => Err(SkillError::NotFound(format!("retrieval skill {id}"))),
        }
    }

    /// Propagate a dataset deletion to the cached runtimes that mounted it.
    pub async fn detach_dataset(&self, dataset_id: &DatasetId, skill_ids: &[SkillId]) {
        for id in skill_ids {
            if let Some(runtime) = self.cache.get(id) {
                runtime.forget_dataset(dataset_id).await;
            }
        }
    }
}

impl<P: Platform> SkillManager for RetrievalManager<P> {
    type Input = CreateRetrievalSkillRequest;
    type Record = RetrievalSkill;
    type Runtime = RetrievalSkillRuntime<P>;

    fn skill_type(&self) -> SkillType {
        SkillType::Retrieve
    }

    async fn create_skill(
        &self,
        input: CreateRetrievalSkillRequest,
    ) -> Result<RetrievalSkill, SkillError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(SkillError::Validation(
                "retrieval skill name must not be empty".to_string(),
            ));
        }

        let skill = RetrievalSkill {
            id: SkillId::new(),
            tenant_id: self.tenant_id.clone(),
            name: name.to_string(),
            mounted_dataset_ids: Default::default(),
            deploy_path: None,
            deploy_time: None,
            created_at: Utc::now(),
        };
        let created = self.backends.retrievals.create(&skill).await?;
        tracing::info!(tenant_id = %self.tenant_id, skill_id = %created.id, "created retrieval skill");
        Ok(created)
    }

    async fn get_skill(&self, id: &SkillId) -> Result<Arc<RetrievalSkillRuntime<P>>, SkillError> {
        self.cache
            .get_or_init(id, || async {
                let record = self.load_record(id).await?;
                tracing::debug!(skill_id = %id, "materializing retrieval skill");
                RetrievalSkillRuntime::materialize(
                    record,
                    self.backends.clone(),
                    self.cache.lock_handle(id),
                )
                .await
            })
            .await
    }

    async fn delete_skill(&self, id: &SkillId) -> Result<(), SkillError> {
        let record = self.load_record(id).await?;
        let lock = self.cache.lock_handle(id);
        let guard = lock.lock().await;

        self.backends.retrievals.delete(id).await?;

        match self.cache.evict(id) {
            Some(runtime) => {
                drop(guard);
                runtime.retire().await;
            }
            None => {
                drop(guard);
                if let Some(location) = &record.deploy_path
                    && let Err(e) = self.backends.vectors.release(location).await
                {
                    tracing::warn!(skill_id = %id, location = %location, "failed to release vector index: {e}");
                }
            }
        }

        tracing::info!(tenant_id = %self.tenant_id, skill_id = %id, "deleted retrieval skill");
        Ok(())
    }

    async fn get_all_skills(&self) -> Result<Vec<RetrievalSkill>, SkillError> {
        Ok(self
            .backends
            .retrievals
            .list_by_tenant(&self.tenant_id)
            .await?)
    }

    async fn get_certain_skill(&self, id: &SkillId) -> Result<RetrievalSkill, SkillError> {
        match self.cache.get(id) {
            Some(runtime) => Ok(runtime.record().await),
            None => self.load_record(id).await,
        }
    }

    async fn skill_count(&self) -> Result<i64, SkillError> {
        Ok(self
            .backends
            .retrievals
            .count_by_tenant(&self.tenant_id)
            .await?)
    }

    fn release(&self) {
        self.cache.clear();
    }
}
