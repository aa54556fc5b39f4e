//! SQLite retrieval skill repository implementation.
//!
//! Mounted datasets live in the `retrieval_mounts` join table and are loaded
//! alongside every skill row.

use std::collections::BTreeSet;

use chatskill_core::repository::retrieval::RetrievalSkillRepository;
use chatskill_types::dataset::DatasetId;
use chatskill_types::error::RepositoryError;
use chatskill_types::retrieval::RetrievalSkill;
use chatskill_types::skill::SkillId;
use chatskill_types::tenant::TenantId;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_id, query_err};

/// SQLite-backed implementation of `RetrievalSkillRepository`.
pub struct SqliteRetrievalSkillRepository {
    pool: DatabasePool,
}

impl SqliteRetrievalSkillRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn mounted(&self, id: &str) -> Result<BTreeSet<DatasetId>, RepositoryError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT dataset_id FROM retrieval_mounts WHERE skill_id = ?")
                .bind(id)
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_err)?;
        rows.iter().map(|(d,)| parse_id(d, "dataset")).collect()
    }

    async fn hydrate(&self, row: &sqlx::sqlite::SqliteRow) -> Result<RetrievalSkill, RepositoryError> {
        let id: String = row.try_get("id").map_err(query_err)?;
        let tenant_id: String = row.try_get("tenant_id").map_err(query_err)?;
        let name: String = row.try_get("name").map_err(query_err)?;
        let deploy_path: Option<String> = row.try_get("deploy_path").map_err(query_err)?;
        let deploy_time: Option<String> = row.try_get("deploy_time").map_err(query_err)?;
        let created_at: String = row.try_get("created_at").map_err(query_err)?;

        Ok(RetrievalSkill {
            mounted_dataset_ids: self.mounted(&id).await?,
            id: parse_id(&id, "skill")?,
            tenant_id: parse_id(&tenant_id, "tenant")?,
            name,
            deploy_path,
            deploy_time: deploy_time.as_deref().map(parse_datetime).transpose()?,
            created_at: parse_datetime(&created_at)?,
        })
    }
}

impl RetrievalSkillRepository for SqliteRetrievalSkillRepository {
    async fn create(&self, skill: &RetrievalSkill) -> Result<RetrievalSkill, RepositoryError> {
        sqlx::query(
            "INSERT INTO retrieval_skills (id, tenant_id, name, deploy_path, deploy_time, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(skill.id.to_string())
        .bind(skill.tenant_id.to_string())
        .bind(&skill.name)
        .bind(&skill.deploy_path)
        .bind(skill.deploy_time.as_ref().map(format_datetime))
        .bind(format_datetime(&skill.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if !skill.mounted_dataset_ids.is_empty() {
            let ids: Vec<DatasetId> = skill.mounted_dataset_ids.iter().cloned().collect();
            self.mount(&skill.id, &ids).await?;
        }
        Ok(skill.clone())
    }

    async fn get_by_id(&self, id: &SkillId) -> Result<Option<RetrievalSkill>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM retrieval_skills WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<RetrievalSkill>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM retrieval_skills WHERE tenant_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut skills = Vec::with_capacity(rows.len());
        for row in &rows {
            skills.push(self.hydrate(row).await?);
        }
        Ok(skills)
    }

    async fn delete(&self, id: &SkillId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM retrieval_skills WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count_by_tenant(&self, tenant_id: &TenantId) -> Result<i64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM retrieval_skills WHERE tenant_id = ?")
                .bind(tenant_id.to_string())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_err)?;
        Ok(count)
    }

    async fn mount(&self, id: &SkillId, dataset_ids: &[DatasetId]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        for dataset_id in dataset_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO retrieval_mounts (skill_id, dataset_id) VALUES (?, ?)",
            )
            .bind(id.to_string())
            .bind(dataset_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }
        tx.commit().await.map_err(query_err)
    }

    async fn set_deployment(
        &self,
        id: &SkillId,
        deploy_path: &str,
        deploy_time: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE retrieval_skills SET deploy_path = ?, deploy_time = ? WHERE id = ?",
        )
        .bind(deploy_path)
        .bind(format_datetime(&deploy_time))
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
