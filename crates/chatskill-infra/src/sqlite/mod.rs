//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools, plus the FTS5 lexical search engine.

pub mod dataset;
pub mod model;
pub mod pool;
pub mod retrieval;
pub mod search;
pub mod slu;
pub mod tenant;

use chatskill_types::error::RepositoryError;
use chrono::{DateTime, Utc};

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

/// Parse a stored id column.
pub(crate) fn parse_id<T>(s: &str, what: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| RepositoryError::Query(format!("invalid {what} id: {e}")))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Query(e.to_string()))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(
    s: &str,
    what: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what} JSON: {e}")))
}

/// `?, ?, ?` for an `IN (...)` list of `n` values.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
pub(crate) mod test_support {
    use chatskill_core::repository::tenant::TenantRepository;
    use chatskill_types::tenant::{Tenant, TenantId};
    use chrono::Utc;

    use super::pool::DatabasePool;
    use super::tenant::SqliteTenantRepository;

    pub async fn pool(dir: &std::path::Path) -> DatabasePool {
        let url = format!("sqlite://{}?mode=rwc", dir.join("test.db").display());
        DatabasePool::new(&url).await.unwrap()
    }

    pub async fn tenant(pool: &DatabasePool) -> TenantId {
        let tenant = Tenant {
            id: TenantId::new(),
            description: "test bot".to_string(),
            created_at: Utc::now(),
        };
        SqliteTenantRepository::new(pool.clone())
            .create(&tenant)
            .await
            .unwrap();
        tenant.id
    }
}
