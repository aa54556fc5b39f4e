//! SQLite dataset repository implementation.
//!
//! A dataset row and its documents are inserted in one transaction. Document
//! ids come from the `documents` autoincrement key and double as the
//! candidate keys of the lexical and vector indices.

use chatskill_core::repository::dataset::DatasetRepository;
use chatskill_types::dataset::{DatasetId, Document, NewDocument, RetrievalDataset};
use chatskill_types::error::RepositoryError;
use chatskill_types::skill::SkillId;
use chatskill_types::tenant::TenantId;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{
    format_datetime, from_json, parse_datetime, parse_id, placeholders, query_err, to_json,
};

/// SQLite-backed implementation of `DatasetRepository`.
pub struct SqliteDatasetRepository {
    pool: DatabasePool,
}

impl SqliteDatasetRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn row_to_dataset(row: &sqlx::sqlite::SqliteRow) -> Result<RetrievalDataset, RepositoryError> {
    let id: String = row.try_get("id").map_err(query_err)?;
    let tenant_id: String = row.try_get("tenant_id").map_err(query_err)?;
    let name: String = row.try_get("name").map_err(query_err)?;
    let segmented: bool = row.try_get("segmented").map_err(query_err)?;
    let document_count: i64 = row.try_get("document_count").map_err(query_err)?;
    let created_at: String = row.try_get("created_at").map_err(query_err)?;

    Ok(RetrievalDataset {
        id: parse_id(&id, "dataset")?,
        tenant_id: parse_id(&tenant_id, "tenant")?,
        name,
        segmented,
        document_count,
        created_at: parse_datetime(&created_at)?,
    })
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(query_err)?;
    let dataset_id: String = row.try_get("dataset_id").map_err(query_err)?;
    let content: String = row.try_get("content").map_err(query_err)?;
    let attributes: String = row.try_get("attributes").map_err(query_err)?;
    let sentences: String = row.try_get("sentences").map_err(query_err)?;

    Ok(Document {
        id,
        dataset_id: parse_id(&dataset_id, "dataset")?,
        content,
        attributes: from_json(&attributes, "attributes")?,
        sentences: from_json(&sentences, "sentences")?,
    })
}

impl DatasetRepository for SqliteDatasetRepository {
    async fn create(
        &self,
        dataset: &RetrievalDataset,
        documents: &[NewDocument],
    ) -> Result<(RetrievalDataset, Vec<Document>), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query(
            "INSERT INTO datasets (id, tenant_id, name, segmented, document_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(dataset.id.to_string())
        .bind(dataset.tenant_id.to_string())
        .bind(&dataset.name)
        .bind(dataset.segmented)
        .bind(documents.len() as i64)
        .bind(format_datetime(&dataset.created_at))
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        let mut stored = Vec::with_capacity(documents.len());
        for doc in documents {
            let result = sqlx::query(
                "INSERT INTO documents (dataset_id, content, attributes, sentences) VALUES (?, ?, ?, ?)",
            )
            .bind(dataset.id.to_string())
            .bind(&doc.content)
            .bind(to_json(&doc.attributes)?)
            .bind(to_json(&doc.sentences)?)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

            stored.push(Document {
                id: result.last_insert_rowid(),
                dataset_id: dataset.id.clone(),
                content: doc.content.clone(),
                attributes: doc.attributes.clone(),
                sentences: doc.sentences.clone(),
            });
        }

        tx.commit().await.map_err(query_err)?;

        let mut created = dataset.clone();
        created.document_count = stored.len() as i64;
        Ok((created, stored))
    }

    async fn get_by_id(&self, id: &DatasetId) -> Result<Option<RetrievalDataset>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM datasets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.as_ref().map(row_to_dataset).transpose()
    }

    async fn list_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<RetrievalDataset>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM datasets WHERE tenant_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter().map(row_to_dataset).collect()
    }

    async fn documents(&self, dataset_ids: &[DatasetId]) -> Result<Vec<Document>, RepositoryError> {
        if dataset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM documents WHERE dataset_id IN ({}) ORDER BY id ASC",
            placeholders(dataset_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in dataset_ids {
            query = query.bind(id.to_string());
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        rows.iter().map(row_to_document).collect()
    }

    async fn documents_by_ids(&self, ids: &[i64]) -> Result<Vec<Document>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM documents WHERE id IN ({}) ORDER BY id ASC",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        rows.iter().map(row_to_document).collect()
    }

    async fn unmount_everywhere(&self, id: &DatasetId) -> Result<Vec<SkillId>, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT skill_id FROM retrieval_mounts WHERE dataset_id = ?")
                .bind(id.to_string())
                .fetch_all(&mut *tx)
                .await
                .map_err(query_err)?;
        sqlx::query("DELETE FROM retrieval_mounts WHERE dataset_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        tx.commit().await.map_err(query_err)?;

        rows.iter().map(|(s,)| parse_id(s, "skill")).collect()
    }

    async fn delete(&self, id: &DatasetId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM datasets WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chatskill_core::repository::retrieval::RetrievalSkillRepository;
    use chatskill_types::retrieval::RetrievalSkill;
    use chrono::Utc;

    use super::*;
    use crate::sqlite::retrieval::SqliteRetrievalSkillRepository;
    use crate::sqlite::test_support;

    fn dataset(tenant_id: &TenantId, segmented: bool) -> RetrievalDataset {
        RetrievalDataset {
            id: DatasetId::new(),
            tenant_id: tenant_id.clone(),
            name: "docs".to_string(),
            segmented,
            document_count: 0,
            created_at: Utc::now(),
        }
    }

    fn doc(content: &str, sentences: &[&str]) -> NewDocument {
        let mut attributes = serde_json::Map::new();
        attributes.insert("source".to_string(), serde_json::json!("faq"));
        NewDocument {
            content: content.to_string(),
            attributes,
            sentences: sentences.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_support::pool(dir.path()).await;
        let tenant_id = test_support::tenant(&pool).await;
        let repo = SqliteDatasetRepository::new(pool);

        let (created, docs) = repo
            .create(
                &dataset(&tenant_id, true),
                &[doc("a. b.", &["a.", "b."]), doc("c.", &["c."])],
            )
            .await
            .unwrap();
        assert_eq!(created.document_count, 2);
        assert!(docs[0].id < docs[1].id);

        let fetched = repo.documents(std::slice::from_ref(&created.id)).await.unwrap();
        assert_eq!(fetched, docs);
        assert_eq!(fetched[0].attributes["source"], "faq");

        let by_id = repo.documents_by_ids(&[docs[1].id, 9999]).await.unwrap();
        assert_eq!(by_id, vec![docs[1].clone()]);
        assert_eq!(repo.list_by_tenant(&tenant_id).await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_unmount_everywhere_reports_skills() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_support::pool(dir.path()).await;
        let tenant_id = test_support::tenant(&pool).await;
        let datasets = SqliteDatasetRepository::new(pool.clone());
        let skills = SqliteRetrievalSkillRepository::new(pool);

        let (created, _) = datasets
            .create(&dataset(&tenant_id, false), &[doc("hello", &[])])
            .await
            .unwrap();
        let skill = skills
            .create(&RetrievalSkill {
                id: SkillId::new(),
                tenant_id: tenant_id.clone(),
                name: "faq".to_string(),
                mounted_dataset_ids: BTreeSet::new(),
                deploy_path: None,
                deploy_time: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        skills
            .mount(&skill.id, &[created.id.clone(), created.id.clone()])
            .await
            .unwrap();
        let mounted = skills.get_by_id(&skill.id).await.unwrap().unwrap();
        assert_eq!(mounted.mounted_dataset_ids, BTreeSet::from([created.id.clone()]));

        assert_eq!(
            datasets.unmount_everywhere(&created.id).await.unwrap(),
            vec![skill.id.clone()]
        );
        datasets.delete(&created.id).await.unwrap();
        let after = skills.get_by_id(&skill.id).await.unwrap().unwrap();
        assert!(after.mounted_dataset_ids.is_empty());
        assert!(datasets.get_by_id(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_deployment_updates_row() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_support::pool(dir.path()).await;
        let tenant_id = test_support::tenant(&pool).await;
        let skills = SqliteRetrievalSkillRepository::new(pool);
        let skill = skills
            .create(&RetrievalSkill {
                id: SkillId::new(),
                tenant_id,
                name: "faq".to_string(),
                mounted_dataset_ids: BTreeSet::new(),
                deploy_path: None,
                deploy_time: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let when = Utc::now();
        skills.set_deployment(&skill.id, "retrieval_x_y", when).await.unwrap();
        let stored = skills.get_by_id(&skill.id).await.unwrap().unwrap();
        assert_eq!(stored.deploy_path.as_deref(), Some("retrieval_x_y"));
        assert_eq!(stored.deploy_time, Some(when));
        assert!(stored.is_deployed());

        skills.delete(&skill.id).await.unwrap();
        assert!(matches!(
            skills.set_deployment(&skill.id, "other", when).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
