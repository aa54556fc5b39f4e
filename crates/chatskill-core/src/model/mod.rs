//! Model skills: training, tracked runs, export and import.

pub mod holdout;
pub mod manager;
pub mod runtime;

/// Tracker namespace grouping a tenant's training runs.
pub fn experiment_namespace(tenant_id: &chatskill_types::tenant::TenantId) -> String {
    format!("chatbot-{tenant_id}")
}
