//! SQLite tenant repository implementation.

use chatskill_core::repository::tenant::TenantRepository;
use chatskill_types::error::RepositoryError;
use chatskill_types::tenant::{Tenant, TenantId};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_id, query_err};

/// SQLite-backed implementation of `TenantRepository`.
pub struct SqliteTenantRepository {
    pool: DatabasePool,
}

impl SqliteTenantRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn row_to_tenant(row: &sqlx::sqlite::SqliteRow) -> Result<Tenant, RepositoryError> {
    let id: String = row.try_get("id").map_err(query_err)?;
    let description: String = row.try_get("description").map_err(query_err)?;
    let created_at: String = row.try_get("created_at").map_err(query_err)?;

    Ok(Tenant {
        id: parse_id(&id, "tenant")?,
        description,
        created_at: parse_datetime(&created_at)?,
    })
}

impl TenantRepository for SqliteTenantRepository {
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, RepositoryError> {
        let result = sqlx::query("INSERT INTO tenants (id, description, created_at) VALUES (?, ?, ?)")
            .bind(tenant.id.to_string())
            .bind(&tenant.description)
            .bind(format_datetime(&tenant.created_at))
            .execute(&self.pool.writer)
            .await;

        match result {
            Ok(_) => Ok(tenant.clone()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("tenant {} already exists", tenant.id)),
            ),
            Err(e) => Err(query_err(e)),
        }
    }

    async fn get_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM tenants WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.as_ref().map(row_to_tenant).transpose()
    }

    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM tenants ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        rows.iter().map(row_to_tenant).collect()
    }

    async fn delete(&self, id: &TenantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = ?")
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
