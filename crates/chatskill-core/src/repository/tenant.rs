//! Tenant repository trait definition.

use chatskill_types::error::RepositoryError;
use chatskill_types::tenant::{Tenant, TenantId};

/// Repository trait for tenant persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait TenantRepository: Send + Sync {
    fn create(
        &self,
        tenant: &Tenant,
    ) -> impl std::future::Future<Output = Result<Tenant, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &TenantId,
    ) -> impl std::future::Future<Output = Result<Option<Tenant>, RepositoryError>> + Send;

    /// All tenants, oldest first.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Tenant>, RepositoryError>> + Send;

    /// Delete a tenant. Owned skills, datasets, and documents cascade.
    fn delete(
        &self,
        id: &TenantId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
