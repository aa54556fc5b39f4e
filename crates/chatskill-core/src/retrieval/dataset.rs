//! Tenant-level dataset catalog.
//!
//! A dataset is persisted as rows plus one lexical index holding every
//! document (and every sentence, when segmented). Retrieval skills mount
//! datasets by id; deleting a dataset unmounts it everywhere.

use std::collections::HashSet;

use chatskill_types::dataset::{
    CreateDatasetRequest, DatasetId, Document, RetrievalDataset,
};
use chatskill_types::error::SkillError;
use chatskill_types::retrieval::IndexEntry;
use chatskill_types::skill::SkillId;
use chatskill_types::tenant::TenantId;
use chrono::Utc;

use super::rankable_units;
use crate::capability::search::SearchEngine;
use crate::platform::{Backends, Platform};
use crate::repository::dataset::DatasetRepository;

pub struct DatasetCatalog<P: Platform> {
    tenant_id: TenantId,
    backends: Backends<P>,
}

impl<P: Platform> DatasetCatalog<P> {
    pub fn new(tenant_id: TenantId, backends: Backends<P>) -> Self {
        Self { tenant_id, backends }
    }

    /// Persist a dataset and build its lexical index.
    ///
    /// Segmented datasets keep caller-supplied sentences; a document without
    /// any is treated as one sentence. Non-segmented datasets drop them.
    pub async fn create(
        &self,
        request: CreateDatasetRequest,
    ) -> Result<RetrievalDataset, SkillError> {
        if request.name.trim().is_empty() {
            return Err(SkillError::Validation(
                "dataset name must not be empty".to_string(),
            ));
        }
        if request.documents.is_empty() {
            return Err(SkillError::Validation(
                "a dataset needs at least one document".to_string(),
            ));
        }
        if let Some(position) = request
            .documents
            .iter()
            .position(|d| d.content.trim().is_empty())
        {
            return Err(SkillError::Validation(format!(
                "document {position} has empty content"
            )));
        }

        let segmented = request.segment;
        let documents: Vec<_> = request
            .documents
            .into_iter()
            .map(|mut doc| {
                if !segmented {
                    doc.sentences.clear();
                } else if doc.sentences.is_empty() {
                    doc.sentences.push(doc.content.clone());
                }
                doc
            })
            .collect();

        let dataset = RetrievalDataset {
            id: DatasetId::new(),
            tenant_id: self.tenant_id.clone(),
            name: request.name,
            segmented,
            document_count: documents.len() as i64,
            created_at: Utc::now(),
        };

        let (dataset, stored) = self.backends.datasets.create(&dataset, &documents).await?;

        if let Err(e) = self.build_lexical_index(&dataset, &stored).await {
            tracing::warn!(dataset_id = %dataset.id, "lexical indexing failed, rolling back: {e}");
            self.discard(&dataset).await;
            return Err(e);
        }

        tracing::info!(
            tenant_id = %self.tenant_id,
            dataset_id = %dataset.id,
            documents = dataset.document_count,
            segmented,
            "created dataset"
        );
        Ok(dataset)
    }

    pub async fn list(&self) -> Result<Vec<RetrievalDataset>, SkillError> {
        Ok(self.backends.datasets.list_by_tenant(&self.tenant_id).await?)
    }

    /// Fetch a dataset owned by this tenant.
    pub async fn get(&self, id: &DatasetId) -> Result<RetrievalDataset, SkillError> {
        match self.backends.datasets.get_by_id(id).await? {
            Some(dataset) if dataset.tenant_id == self.tenant_id => Ok(dataset),
            _ => Err(SkillError::NotFound(format!("dataset {id}"))),
        }
    }

    pub async fn documents(&self, id: &DatasetId) -> Result<Vec<Document>, SkillError> {
        let dataset = self.get(id).await?;
        Ok(self
            .backends
            .datasets
            .documents(std::slice::from_ref(&dataset.id))
            .await?)
    }

    /// Delete a dataset, its documents, and its lexical index. Returns the
    /// skills that had it mounted.
    pub async fn delete(&self, id: &DatasetId) -> Result<Vec<SkillId>, SkillError> {
        let dataset = self.get(id).await?;
        let affected = self.backends.datasets.unmount_everywhere(&dataset.id).await?;
        self.backends.datasets.delete(&dataset.id).await?;
        if let Err(e) = self
            .backends
            .search
            .delete_index(&dataset.lexical_index_name())
            .await
        {
            tracing::warn!(dataset_id = %dataset.id, "failed to drop lexical index: {e}");
        }

        tracing::info!(
            dataset_id = %dataset.id,
            unmounted_from = affected.len(),
            "deleted dataset"
        );
        Ok(affected)
    }

    async fn build_lexical_index(
        &self,
        dataset: &RetrievalDataset,
        documents: &[Document],
    ) -> Result<(), SkillError> {
        let name = dataset.lexical_index_name();
        self.backends.search.create_index(&name).await?;

        let segmented: HashSet<DatasetId> = if dataset.segmented {
            HashSet::from([dataset.id.clone()])
        } else {
            HashSet::new()
        };
        let entries: Vec<IndexEntry> = rankable_units(documents, &segmented)
            .into_iter()
            .map(|(key, text)| IndexEntry { key, text })
            .collect();
        self.backends.search.index_entries(&name, &entries).await?;
        Ok(())
    }

    async fn discard(&self, dataset: &RetrievalDataset) {
        if let Err(e) = self.backends.datasets.delete(&dataset.id).await {
            tracing::warn!(dataset_id = %dataset.id, "failed to delete dataset rows: {e}");
        }
        if let Err(e) = self
            .backends
            .search
            .delete_index(&dataset.lexical_index_name())
            .await
        {
            tracing::warn!(dataset_id = %dataset.id, "failed to drop lexical index: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use chatskill_types::dataset::NewDocument;

    use super::*;
    use crate::testing::{TestPlatform, harness};

    fn request(segment: bool, docs: &[(&str, &[&str])]) -> CreateDatasetRequest {
        CreateDatasetRequest {
            name: "docs".into(),
            segment,
            documents: docs
                .iter()
                .map(|(content, sentences)| NewDocument {
                    content: content.to_string(),
                    attributes: serde_json::Map::new(),
                    sentences: sentences.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let catalog = DatasetCatalog::<TestPlatform>::new(TenantId::new(), h.backends.clone());

        assert!(matches!(
            catalog.create(request(false, &[])).await,
            Err(SkillError::Validation(_))
        ));
        assert!(matches!(
            catalog.create(request(false, &[("ok", &[]), ("  ", &[])])).await,
            Err(SkillError::Validation(_))
        ));
        let mut unnamed = request(false, &[("ok", &[])]);
        unnamed.name = " ".into();
        assert!(matches!(
            catalog.create(unnamed).await,
            Err(SkillError::Validation(_))
        ));
        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sentences_follow_segment_flag() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let catalog = DatasetCatalog::<TestPlatform>::new(TenantId::new(), h.backends.clone());

        let plain = catalog
            .create(request(false, &[("one. two.", &["one.", "two."])]))
            .await
            .unwrap();
        assert!(!plain.segmented);
        assert!(catalog.documents(&plain.id).await.unwrap()[0].sentences.is_empty());

        let segmented = catalog
            .create(request(true, &[("one. two.", &["one.", "two."]), ("whole", &[])]))
            .await
            .unwrap();
        let docs = catalog.documents(&segmented.id).await.unwrap();
        assert_eq!(docs[0].sentences, vec!["one.", "two."]);
        assert_eq!(docs[1].sentences, vec!["whole"]);
        assert_eq!(segmented.document_count, 2);
        assert!(
            h.search
                .index_exists(&segmented.lexical_index_name())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_see_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path());
        let owner = DatasetCatalog::<TestPlatform>::new(TenantId::new(), h.backends.clone());
        let stranger = DatasetCatalog::<TestPlatform>::new(TenantId::new(), h.backends.clone());
        let dataset = owner.create(request(false, &[("hi", &[])])).await.unwrap();

        assert!(matches!(
            stranger.get(&dataset.id).await,
            Err(SkillError::NotFound(_))
        ));
        assert!(matches!(
            stranger.delete(&dataset.id).await,
            Err(SkillError::NotFound(_))
        ));
        assert_eq!(owner.delete(&dataset.id).await.unwrap(), Vec::<SkillId>::new());
        assert!(
            !h.search
                .index_exists(&dataset.lexical_index_name())
                .await
                .unwrap()
        );
    }
}
