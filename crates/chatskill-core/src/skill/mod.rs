//! The generic skill manager contract and the closed set of managers.
//!
//! A tenant owns at most one manager per [`SkillType`]. Managers are built
//! through [`SkillManagerHandle::construct`], a static table over the enum.

pub mod cache;

use std::sync::Arc;

use chatskill_types::error::SkillError;
use chatskill_types::skill::{SkillId, SkillType};
use chatskill_types::tenant::TenantId;

use crate::model::manager::ModelManager;
use crate::platform::{Backends, Platform};
use crate::repository::model::ModelSkillRepository;
use crate::repository::retrieval::RetrievalSkillRepository;
use crate::repository::slu::SluSkillRepository;
use crate::retrieval::manager::RetrievalManager;
use crate::slu::manager::SluManager;

/// Per-tenant, per-type collection and lifecycle owner of skills.
pub trait SkillManager: Send + Sync {
    /// Creation request.
    type Input: Send;
    /// Persisted row projection.
    type Record: Clone + Send + Sync;
    /// Materialized, cached skill.
    type Runtime: Send + Sync;

    fn skill_type(&self) -> SkillType;

    /// Validate `input` and persist a new skill row.
    fn create_skill(
        &self,
        input: Self::Input,
    ) -> impl std::future::Future<Output = Result<Self::Record, SkillError>> + Send;

    /// The cached runtime, materialized from its row on first access.
    fn get_skill(
        &self,
        id: &SkillId,
    ) -> impl std::future::Future<Output = Result<Arc<Self::Runtime>, SkillError>> + Send;

    /// Remove the row and cached runtime, releasing deployed resources.
    fn delete_skill(
        &self,
        id: &SkillId,
    ) -> impl std::future::Future<Output = Result<(), SkillError>> + Send;

    fn get_all_skills(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Self::Record>, SkillError>> + Send;

    fn get_certain_skill(
        &self,
        id: &SkillId,
    ) -> impl std::future::Future<Output = Result<Self::Record, SkillError>> + Send;

    /// Persisted skill count; zero means the manager should be torn down.
    fn skill_count(&self) -> impl std::future::Future<Output = Result<i64, SkillError>> + Send;

    /// Drop every cached runtime.
    fn release(&self);
}

/// A constructed manager of one of the served skill types.
pub enum SkillManagerHandle<P: Platform> {
    Retrieve(Arc<RetrievalManager<P>>),
    Slu(Arc<SluManager<P>>),
    Model(Arc<ModelManager<P>>),
}

impl<P: Platform> Clone for SkillManagerHandle<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Retrieve(m) => Self::Retrieve(Arc::clone(m)),
            Self::Slu(m) => Self::Slu(Arc::clone(m)),
            Self::Model(m) => Self::Model(Arc::clone(m)),
        }
    }
}

impl<P: Platform> SkillManagerHandle<P> {
    /// Build the manager for `skill_type`.
    ///
    /// KBQA is a recognised type without a runtime; asking for it is a
    /// validation error.
    pub fn construct(
        skill_type: SkillType,
        tenant_id: &TenantId,
        backends: &Backends<P>,
    ) -> Result<Self, SkillError> {
        match skill_type {
            SkillType::Retrieve => Ok(Self::Retrieve(Arc::new(RetrievalManager::new(
                tenant_id.clone(),
                backends.clone(),
            )))),
            SkillType::Slu => Ok(Self::Slu(Arc::new(SluManager::new(
                tenant_id.clone(),
                backends.clone(),
            )))),
            SkillType::ModelManager => Ok(Self::Model(Arc::new(ModelManager::new(
                tenant_id.clone(),
                backends.clone(),
            )))),
            SkillType::Kbqa => Err(SkillError::Validation(format!(
                "{} skills are not supported",
                SkillType::Kbqa
            ))),
        }
    }

    /// Persisted count of `skill_type` skills for a tenant, without a manager.
    pub async fn persisted_count(
        skill_type: SkillType,
        tenant_id: &TenantId,
        backends: &Backends<P>,
    ) -> Result<i64, SkillError> {
        let count = match skill_type {
            SkillType::Retrieve => backends.retrievals.count_by_tenant(tenant_id).await?,
            SkillType::Slu => backends.slus.count_by_tenant(tenant_id).await?,
            SkillType::ModelManager => backends.models.count_by_tenant(tenant_id).await?,
            SkillType::Kbqa => 0,
        };
        Ok(count)
    }

    pub fn as_retrieval(&self) -> Option<&Arc<RetrievalManager<P>>> {
        match self {
            Self::Retrieve(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_slu(&self) -> Option<&Arc<SluManager<P>>> {
        match self {
            Self::Slu(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Arc<ModelManager<P>>> {
        match self {
            Self::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn skill_type(&self) -> SkillType {
        match self {
            Self::Retrieve(m) => m.skill_type(),
            Self::Slu(m) => m.skill_type(),
            Self::Model(m) => m.skill_type(),
        }
    }

    pub async fn skill_count(&self) -> Result<i64, SkillError> {
        match self {
            Self::Retrieve(m) => m.skill_count().await,
            Self::Slu(m) => m.skill_count().await,
            Self::Model(m) => m.skill_count().await,
        }
    }

    pub async fn skill_ids(&self) -> Result<Vec<SkillId>, SkillError> {
        let ids = match self {
            Self::Retrieve(m) => m.get_all_skills().await?.into_iter().map(|s| s.id).collect(),
            Self::Slu(m) => m.get_all_skills().await?.into_iter().map(|s| s.id).collect(),
            Self::Model(m) => m.get_all_skills().await?.into_iter().map(|s| s.id).collect(),
        };
        Ok(ids)
    }

    pub async fn delete_skill(&self, id: &SkillId) -> Result<(), SkillError> {
        match self {
            Self::Retrieve(m) => m.delete_skill(id).await,
            Self::Slu(m) => m.delete_skill(id).await,
            Self::Model(m) => m.delete_skill(id).await,
        }
    }

    pub fn release(&self) {
        match self {
            Self::Retrieve(m) => m.release(),
            Self::Slu(m) => m.release(),
            Self::Model(m) => m.release(),
        }
    }
}
