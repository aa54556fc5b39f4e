//! Retrieval skill repository trait definition.

use chatskill_types::dataset::DatasetId;
use chatskill_types::error::RepositoryError;
use chatskill_types::retrieval::RetrievalSkill;
use chatskill_types::skill::SkillId;
use chatskill_types::tenant::TenantId;
use chrono::{DateTime, Utc};

/// Repository trait for retrieval skill rows and the dataset mount join.
///
/// Returned skills always carry their current mounted dataset ids.
pub trait RetrievalSkillRepository: Send + Sync {
    fn create(
        &self,
        skill: &RetrievalSkill,
    ) -> impl std::future::Future<Output = Result<RetrievalSkill, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &SkillId,
    ) -> impl std::future::Future<Output = Result<Option<RetrievalSkill>, RepositoryError>> + Send;

    fn list_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<Vec<RetrievalSkill>, RepositoryError>> + Send;

    /// Delete the skill and its mount rows.
    fn delete(
        &self,
        id: &SkillId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn count_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Add mount rows. Already-mounted ids are ignored.
    fn mount(
        &self,
        id: &SkillId,
        dataset_ids: &[DatasetId],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Point the skill at a new vector index in a single row update.
    fn set_deployment(
        &self,
        id: &SkillId,
        deploy_path: &str,
        deploy_time: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
