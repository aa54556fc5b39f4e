//! SLU skill manager.

use std::sync::Arc;

use chatskill_types::error::SkillError;
use chatskill_types::skill::{SkillId, SkillType};
use chatskill_types::slu::{CreateSluSkillRequest, SluSkill};
use chatskill_types::tenant::TenantId;
use chrono::Utc;

use super::runtime::SluSkillRuntime;
use crate::platform::{Backends, Platform};
use crate::repository::slu::SluSkillRepository;
use crate::skill::SkillManager;
use crate::skill::cache::RuntimeCache;

pub struct SluManager<P: Platform> {
    tenant_id: TenantId,
    backends: Backends<P>,
    cache: RuntimeCache<SkillId, SluSkillRuntime<P>>,
}

impl<P: Platform> SluManager<P> {
    pub fn new(tenant_id: TenantId, backends: Backends<P>) -> Self {
        Self {
            tenant_id,
            backends,
            cache: RuntimeCache::new(),
        }
    }

    async fn load_record(&self, id: &SkillId) -> Result<SluSkill, SkillError> {
        match self.backends.slus.get_by_id(id).await? {
            Some(skill) if skill.tenant_id == self.tenant_id => Ok(skill),
            _ => Err(SkillError::NotFound(format!("SLU skill {id}"))),
        }
    }
}

impl<P: Platform> SkillManager for SluManager<P> {
    type Input = CreateSluSkillRequest;
    type Record = SluSkill;
    type Runtime = SluSkillRuntime<P>;

    fn skill_type(&self) -> SkillType {
        SkillType::Slu
    }

    async fn create_skill(&self, input: CreateSluSkillRequest) -> Result<SluSkill, SkillError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(SkillError::Validation(
                "SLU skill name must not be empty".to_string(),
            ));
        }

        let skill = SluSkill {
            id: SkillId::new(),
            tenant_id: self.tenant_id.clone(),
            name: name.to_string(),
            task: input.task,
            deployed_model_id: None,
            term_index: None,
            created_at: Utc::now(),
        };
        let created = self.backends.slus.create(&skill).await?;
        tracing::info!(
            tenant_id = %self.tenant_id,
            skill_id = %created.id,
            task = %created.task,
            "created SLU skill"
        );
        Ok(created)
    }

    async fn get_skill(&self, id: &SkillId) -> Result<Arc<SluSkillRuntime<P>>, SkillError> {
        self.cache
            .get_or_init(id, || async {
                let record = self.load_record(id).await?;
                Ok(SluSkillRuntime::new(
                    record,
                    self.backends.clone(),
                    self.cache.lock_handle(id),
                ))
            })
            .await
    }

    async fn delete_skill(&self, id: &SkillId) -> Result<(), SkillError> {
        self.load_record(id).await?;
        let lock = self.cache.lock_handle(id);
        let _guard = lock.lock().await;
        self.backends.slus.delete(id).await?;
        self.cache.evict(id);
        tracing::info!(tenant_id = %self.tenant_id, skill_id = %id, "deleted SLU skill");
        Ok(())
    }

    async fn get_all_skills(&self) -> Result<Vec<SluSkill>, SkillError> {
        Ok(self.backends.slus.list_by_tenant(&self.tenant_id).await?)
    }

    async fn get_certain_skill(&self, id: &SkillId) -> Result<SluSkill, SkillError> {
        match self.cache.get(id) {
            Some(runtime) => Ok(runtime.record().await),
            None => self.load_record(id).await,
        }
    }

    async fn skill_count(&self) -> Result<i64, SkillError> {
        Ok(self.backends.slus.count_by_tenant(&self.tenant_id).await?)
    }

    fn release(&self) {
        self.cache.clear();
    }
}
