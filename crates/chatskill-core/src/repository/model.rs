//! Model skill repository trait definition.

use chatskill_types::error::RepositoryError;
use chatskill_types::model::ModelSkill;
use chatskill_types::skill::SkillId;
use chatskill_types::tenant::TenantId;

/// Repository trait for model skill rows.
pub trait ModelSkillRepository: Send + Sync {
    fn create(
        &self,
        model: &ModelSkill,
    ) -> impl std::future::Future<Output = Result<ModelSkill, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &SkillId,
    ) -> impl std::future::Future<Output = Result<Option<ModelSkill>, RepositoryError>> + Send;

    fn list_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<Vec<ModelSkill>, RepositoryError>> + Send;

    /// Overwrite the mutable columns (run id, artifact, metrics). Fails
    /// `NotFound` when the row is gone.
    fn update(
        &self,
        model: &ModelSkill,
    ) -> impl std::future::Future<Output = Result<ModelSkill, RepositoryError>> + Send;

    fn delete(
        &self,
        id: &SkillId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn count_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
