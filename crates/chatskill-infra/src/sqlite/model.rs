//! SQLite model skill repository implementation.
//!
//! Training arguments, the original request, and metrics are stored as JSON
//! columns.

use chatskill_core::repository::model::ModelSkillRepository;
use chatskill_types::error::RepositoryError;
use chatskill_types::model::ModelSkill;
use chatskill_types::skill::SkillId;
use chatskill_types::tenant::TenantId;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, from_json, parse_datetime, parse_id, query_err, to_json};

/// SQLite-backed implementation of `ModelSkillRepository`.
pub struct SqliteModelSkillRepository {
    pool: DatabasePool,
}

impl SqliteModelSkillRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to `ModelSkill`.
struct ModelRow {
    id: String,
    tenant_id: String,
    task: String,
    skill_type: String,
    skill_id: String,
    args: String,
    original_request: String,
    run_id: Option<String>,
    artifact_uri: Option<String>,
    metrics: String,
    created_at: String,
}

impl ModelRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            task: row.try_get("task")?,
            skill_type: row.try_get("skill_type")?,
            skill_id: row.try_get("skill_id")?,
            args: row.try_get("args")?,
            original_request: row.try_get("original_request")?,
            run_id: row.try_get("run_id")?,
            artifact_uri: row.try_get("artifact_uri")?,
            metrics: row.try_get("metrics")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_model(self) -> Result<ModelSkill, RepositoryError> {
        Ok(ModelSkill {
            id: parse_id(&self.id, "model")?,
            tenant_id: parse_id(&self.tenant_id, "tenant")?,
            task: self.task.parse().map_err(RepositoryError::Query)?,
            skill_type: self.skill_type.parse().map_err(RepositoryError::Query)?,
            skill_id: parse_id(&self.skill_id, "skill")?,
            args: from_json(&self.args, "args")?,
            original_request: from_json(&self.original_request, "original_request")?,
            run_id: self.run_id,
            artifact_uri: self.artifact_uri,
            metrics: from_json(&self.metrics, "metrics")?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<ModelSkill, RepositoryError> {
    ModelRow::from_row(row).map_err(query_err)?.into_model()
}

impl ModelSkillRepository for SqliteModelSkillRepository {
    async fn create(&self, model: &ModelSkill) -> Result<ModelSkill, RepositoryError> {
        sqlx::query(
            "INSERT INTO model_skills (id, tenant_id, task, skill_type, skill_id, args, original_request, run_id, artifact_uri, metrics, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(model.id.to_string())
        .bind(model.tenant_id.to_string())
        .bind(model.task.to_string())
        .bind(model.skill_type.to_string())
        .bind(model.skill_id.to_string())
        .bind(to_json(&model.args)?)
        .bind(to_json(&model.original_request)?)
        .bind(&model.run_id)
        .bind(&model.artifact_uri)
        .bind(to_json(&model.metrics)?)
        .bind(format_datetime(&model.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(model.clone())
    }

    async fn get_by_id(&self, id: &SkillId) -> Result<Option<ModelSkill>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM model_skills WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.as_ref().map(decode).transpose()
    }

    async fn list_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<ModelSkill>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM model_skills WHERE tenant_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter().map(decode).collect()
    }

    async fn update(&self, model: &ModelSkill) -> Result<ModelSkill, RepositoryError> {
        let result = sqlx::query(
            "UPDATE model_skills SET run_id = ?, artifact_uri = ?, metrics = ? WHERE id = ?",
        )
        .bind(&model.run_id)
        .bind(&model.artifact_uri)
        .bind(to_json(&model.metrics)?)
        .bind(model.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(model.clone())
    }

    async fn delete(&self, id: &SkillId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM model_skills WHERE id = ?")
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
            sqlx::query_as("SELECT COUNT(*) FROM model_skills WHERE tenant_id = ?")
                .bind(tenant_id.to_string())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_err)?;
        Ok(count)
    }
}
