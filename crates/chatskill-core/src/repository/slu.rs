//! SLU skill repository trait definition.

use chatskill_types::error::RepositoryError;
use chatskill_types::skill::SkillId;
use chatskill_types::slu::SluSkill;
use chatskill_types::tenant::TenantId;

/// Repository trait for SLU skill rows.
pub trait SluSkillRepository: Send + Sync {
    fn create(
        &self,
        skill: &SluSkill,
    ) -> impl std::future::Future<Output = Result<SluSkill, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &SkillId,
    ) -> impl std::future::Future<Output = Result<Option<SluSkill>, RepositoryError>> + Send;

    fn list_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<Vec<SluSkill>, RepositoryError>> + Send;

    /// Overwrite task, deployed model, and term index.
    fn update(
        &self,
        skill: &SluSkill,
    ) -> impl std::future::Future<Output = Result<SluSkill, RepositoryError>> + Send;

    fn delete(
        &self,
        id: &SkillId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn count_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
