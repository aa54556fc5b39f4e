//! Application state wiring the registry to the local platform.
//!
//! Services are generic over a `Platform`; AppState pins them to the concrete
//! infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use chatskill_core::tenant::registry::TenantRegistry;
use chatskill_core::tenant::session::TenantSession;
use chatskill_infra::config::{load_config, resolve_data_dir};
use chatskill_infra::platform::{LocalPlatform, build_backends};
use chatskill_types::config::ChatskillConfig;
use chatskill_types::tenant::TenantId;

pub type Registry = TenantRegistry<LocalPlatform>;
pub type Session = TenantSession<LocalPlatform>;

/// Shared application state used by every command.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, open stores, wire the
    /// registry.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_config(&data_dir).await;
        tracing::debug!(data_dir = %data_dir.display(), "resolved data directory");
        let backends = build_backends(&data_dir, config).await?;

        Ok(Self {
            registry: Arc::new(TenantRegistry::new(backends)),
            data_dir,
        })
    }

    pub fn config(&self) -> &ChatskillConfig {
        &self.registry.backends().config
    }

    pub async fn session(&self, tenant_id: &TenantId) -> anyhow::Result<Arc<Session>> {
        Ok(self.registry.get_or_create(tenant_id).await?)
    }
}
