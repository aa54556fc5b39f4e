//! Retrieval dataset repository trait definition.

use chatskill_types::dataset::{DatasetId, Document, NewDocument, RetrievalDataset};
use chatskill_types::error::RepositoryError;
use chatskill_types::skill::SkillId;
use chatskill_types::tenant::TenantId;

/// Repository trait for datasets and their documents.
pub trait DatasetRepository: Send + Sync {
    /// Insert a dataset row and its documents in one transaction. Returns the
    /// stored documents with their assigned ids, in input order.
    fn create(
        &self,
        dataset: &RetrievalDataset,
        documents: &[NewDocument],
    ) -> impl std::future::Future<Output = Result<(RetrievalDataset, Vec<Document>), RepositoryError>>
    + Send;

    fn get_by_id(
        &self,
        id: &DatasetId,
    ) -> impl std::future::Future<Output = Result<Option<RetrievalDataset>, RepositoryError>> + Send;

    fn list_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<Vec<RetrievalDataset>, RepositoryError>> + Send;

    /// Documents of the given datasets, ordered by id.
    fn documents(
        &self,
        dataset_ids: &[DatasetId],
    ) -> impl std::future::Future<Output = Result<Vec<Document>, RepositoryError>> + Send;

    /// Documents by id. Missing ids are skipped.
    fn documents_by_ids(
        &self,
        ids: &[i64],
    ) -> impl std::future::Future<Output = Result<Vec<Document>, RepositoryError>> + Send;

    /// Remove the dataset from every skill mounting it. Returns the affected
    /// skill ids.
    fn unmount_everywhere(
        &self,
        id: &DatasetId,
    ) -> impl std::future::Future<Output = Result<Vec<SkillId>, RepositoryError>> + Send;

    /// Delete the dataset and its documents.
    fn delete(
        &self,
        id: &DatasetId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
