use thiserror::Error;

use crate::skill::SkillType;
use crate::tenant::TenantId;

/// Errors surfaced by skill orchestration.
///
/// Each variant is a distinct caller-visible condition; the boundary (CLI)
/// decides how to present them.
#[derive(Debug, Error)]
pub enum SkillError {
    /// A tenant, skill, dataset, model, or index id did not resolve.
    #[error("{0} not found")]
    NotFound(String),

    /// The tenant exists but owns no skill of this type.
    #[error("tenant {tenant} has no {skill_type} skills")]
    ManagerMissing {
        tenant: TenantId,
        skill_type: SkillType,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not deployed: {0}")]
    Undeployed(String),

    /// The trainer failed. The model row is kept without an artifact.
    #[error("training failed: {0}")]
    TrainingFailed(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from repository and capability operations (used by trait definitions
/// in chatskill-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for SkillError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => SkillError::NotFound("entity".to_string()),
            other => SkillError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_missing_display() {
        let tenant = TenantId::new();
        let err = SkillError::ManagerMissing {
            tenant: tenant.clone(),
            skill_type: SkillType::Slu,
        };
        assert_eq!(err.to_string(), format!("tenant {tenant} has no SLU skills"));
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_repository_error_maps_to_skill_error() {
        assert!(matches!(
            SkillError::from(RepositoryError::NotFound),
            SkillError::NotFound(_)
        ));
        assert!(matches!(
            SkillError::from(RepositoryError::Connection),
            SkillError::Storage(_)
        ));
    }
}
