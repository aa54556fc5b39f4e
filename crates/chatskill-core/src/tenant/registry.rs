//! Process-wide tenant registry.
//!
//! Constructed once by the composition root and shared by reference. Sessions
//! are built on first access from the persisted tenant row; concurrent
//! callers for the same tenant observe one session.

use std::sync::Arc;

use chatskill_types::error::SkillError;
use chatskill_types::tenant::{CreateTenantRequest, Tenant, TenantId};
use chrono::Utc;

use super::session::TenantSession;
use crate::platform::{Backends, Platform};
use crate::repository::tenant::TenantRepository;
use crate::skill::cache::RuntimeCache;
use crate::slu::runtime::create_term_index;

pub struct TenantRegistry<P: Platform> {
    backends: Backends<P>,
    sessions: RuntimeCache<TenantId, TenantSession<P>>,
}

impl<P: Platform> TenantRegistry<P> {
    pub fn new(backends: Backends<P>) -> Self {
        Self {
            backends,
            sessions: RuntimeCache::new(),
        }
    }

    pub fn backends(&self) -> &Backends<P> {
        &self.backends
    }

    pub async fn create_tenant(&self, request: CreateTenantRequest) -> Result<Tenant, SkillError> {
        let tenant = Tenant {
            id: TenantId::new(),
            description: request.description.trim().to_string(),
            created_at: Utc::now(),
        };
        let created = self.backends.tenants.create(&tenant).await?;
        tracing::info!(tenant_id = %created.id, "created tenant");
        Ok(created)
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, SkillError> {
        Ok(self.backends.tenants.list().await?)
    }

    /// The session of `tenant_id`, loading it on first access.
    pub async fn get_or_create(&self, tenant_id: &TenantId) -> Result<Arc<TenantSession<P>>, SkillError> {
        self.sessions
            .get_or_init(tenant_id, || async {
                let tenant = self
                    .backends
                    .tenants
                    .get_by_id(tenant_id)
                    .await?
                    .ok_or_else(|| SkillError::NotFound(format!("tenant {tenant_id}")))?;
                TenantSession::load(tenant, self.backends.clone()).await
            })
            .await
    }

    /// Drop a cached session; the next access reloads it from the store.
    pub fn evict(&self, tenant_id: &TenantId) -> bool {
        self.sessions.evict(tenant_id).is_some()
    }

    /// Delete a tenant with every skill, dataset, and index it owns.
    pub async fn delete_tenant(&self, tenant_id: &TenantId) -> Result<(), SkillError> {
        let session = self.get_or_create(tenant_id).await?;
        let lock = self.sessions.lock_handle(tenant_id);
        let _guard = lock.lock().await;

        session.purge().await?;
        self.backends.tenants.delete(tenant_id).await?;
        self.sessions.evict(tenant_id);
        tracing::info!(tenant_id = %tenant_id, "deleted tenant");
        Ok(())
    }

    /// Upload a correction vocabulary as a new term index.
    pub async fn create_term_index(&self, name: &str, terms: &[String]) -> Result<usize, SkillError> {
        create_term_index(self.backends.search.as_ref(), name, terms).await
    }
}
