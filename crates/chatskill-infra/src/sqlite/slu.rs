//! SQLite SLU skill repository implementation.

use chatskill_core::repository::slu::SluSkillRepository;
use chatskill_types::error::RepositoryError;
use chatskill_types::skill::SkillId;
use chatskill_types::slu::SluSkill;
use chatskill_types::tenant::TenantId;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_id, query_err};

/// SQLite-backed implementation of `SluSkillRepository`.
pub struct SqliteSluSkillRepository {
    pool: DatabasePool,
}

impl SqliteSluSkillRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn row_to_skill(row: &sqlx::sqlite::SqliteRow) -> Result<SluSkill, RepositoryError> {
    let id: String = row.try_get("id").map_err(query_err)?;
    let tenant_id: String = row.try_get("tenant_id").map_err(query_err)?;
    let name: String = row.try_get("name").map_err(query_err)?;
    let task: String = row.try_get("task").map_err(query_err)?;
    let deployed_model_id: Option<String> = row.try_get("deployed_model_id").map_err(query_err)?;
    let term_index: Option<String> = row.try_get("term_index").map_err(query_err)?;
    let created_at: String = row.try_get("created_at").map_err(query_err)?;

    Ok(SluSkill {
        id: parse_id(&id, "skill")?,
        tenant_id: parse_id(&tenant_id, "tenant")?,
        name,
        task: task.parse().map_err(RepositoryError::Query)?,
        deployed_model_id: deployed_model_id
            .as_deref()
            .map(|s| parse_id(s, "model"))
            .transpose()?,
        term_index,
        created_at: parse_datetime(&created_at)?,
    })
}

impl SluSkillRepository for SqliteSluSkillRepository {
    async fn create(&self, skill: &SluSkill) -> Result<SluSkill, RepositoryError> {
        sqlx::query(
            "INSERT INTO slu_skills (id, tenant_id, name, task, deployed_model_id, term_index, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(skill.id.to_string())
        .bind(skill.tenant_id.to_string())
        .bind(&skill.name)
        .bind(skill.task.to_string())
        .bind(skill.deployed_model_id.as_ref().map(|id| id.to_string()))
        .bind(&skill.term_index)
        .bind(format_datetime(&skill.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(skill.clone())
    }

    async fn get_by_id(&self, id: &SkillId) -> Result<Option<SluSkill>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM slu_skills WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.as_ref().map(row_to_skill).transpose()
    }

    async fn list_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<SluSkill>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM slu_skills WHERE tenant_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter().map(row_to_skill).collect()
    }

    async fn update(&self, skill: &SluSkill) -> Result<SluSkill, RepositoryError> {
        let result = sqlx::query(
            "UPDATE slu_skills SET task = ?, deployed_model_id = ?, term_index = ? WHERE id = ?",
        )
        .bind(skill.task.to_string())
        .bind(skill.deployed_model_id.as_ref().map(|id| id.to_string()))
        .bind(&skill.term_index)
        .bind(skill.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(skill.clone())
    }

    async fn delete(&self, id: &SkillId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM slu_skills WHERE id = ?")
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
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM slu_skills WHERE tenant_id = ?")
            .bind(tenant_id.to_string())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chatskill_types::skill::SluTask;
    use chrono::Utc;

    use super::*;
    use crate::sqlite::test_support;

    #[tokio::test]
    async fn test_update_persists_deployment() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_support::pool(dir.path()).await;
        let tenant_id = test_support::tenant(&pool).await;
        let repo = SqliteSluSkillRepository::new(pool);

        let mut skill = repo
            .create(&SluSkill {
                id: SkillId::new(),
                tenant_id: tenant_id.clone(),
                name: "nlu".to_string(),
                task: SluTask::Intent,
                deployed_model_id: None,
                term_index: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(repo.count_by_tenant(&tenant_id).await.unwrap(), 1);

        skill.deployed_model_id = Some(SkillId::new());
        skill.term_index = Some("cities".to_string());
        skill.task = SluTask::Both;
        repo.update(&skill).await.unwrap();

        let stored = repo.get_by_id(&skill.id).await.unwrap().unwrap();
        assert_eq!(stored, skill);

        repo.delete(&skill.id).await.unwrap();
        assert!(matches!(repo.update(&skill).await, Err(RepositoryError::NotFound)));
        assert_eq!(repo.count_by_tenant(&tenant_id).await.unwrap(), 0);
    }
}
