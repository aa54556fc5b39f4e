use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::id::TenantId;

/// An isolated namespace owning its own skills and datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Request to register a new tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTenantRequest {
    pub description: String,
}
