//! The local platform: every port pinned to its on-disk implementation.
//!
//! Data directory layout:
//!
//! ```text
//! {data_dir}/chatskill.db   SQLite rows, FTS5 lexical indices
//! {data_dir}/vectors/       LanceDB tables of deployed retrieval skills
//! {data_dir}/mlruns/        tracked training runs and their artifacts
//! {data_dir}/models/        embedding model cache
//! {data_dir}/exports/       exported model archives
//! {data_dir}/training/      per-attempt training output
//! {data_dir}/imports/       unpacked archives awaiting registration
//! ```

use std::path::Path;
use std::sync::Arc;

use chatskill_core::platform::{Backends, Platform};
use chatskill_types::config::ChatskillConfig;

use crate::archive::GzipArchiver;
use crate::slu::{CentroidLoader, CentroidTrainer};
use crate::sqlite::dataset::SqliteDatasetRepository;
use crate::sqlite::model::SqliteModelSkillRepository;
use crate::sqlite::pool::{DatabasePool, database_url};
use crate::sqlite::retrieval::SqliteRetrievalSkillRepository;
use crate::sqlite::search::SqliteSearchEngine;
use crate::sqlite::slu::SqliteSluSkillRepository;
use crate::sqlite::tenant::SqliteTenantRepository;
use crate::tracking::FileTracker;
use crate::vector::embedder::FastEmbedEncoder;
use crate::vector::lance::LanceVectorIndex;

pub struct LocalPlatform;

impl Platform for LocalPlatform {
    type Tenants = SqliteTenantRepository;
    type Models = SqliteModelSkillRepository;
    type Retrievals = SqliteRetrievalSkillRepository;
    type Slus = SqliteSluSkillRepository;
    type Datasets = SqliteDatasetRepository;
    type Encoder = FastEmbedEncoder;
    type Search = SqliteSearchEngine;
    type Vectors = LanceVectorIndex;
    type Trainer = CentroidTrainer<FastEmbedEncoder>;
    type Tracker = FileTracker;
    type Loader = CentroidLoader<FastEmbedEncoder>;
    type Archiver = GzipArchiver;
}

/// Open every store under `data_dir` and wire the local backends.
///
/// The embedding model is only loaded (and downloaded, the first time) when
/// something is embedded.
pub async fn build_backends(
    data_dir: &Path,
    config: ChatskillConfig,
) -> anyhow::Result<Backends<LocalPlatform>> {
    tokio::fs::create_dir_all(data_dir).await?;

    let db_url = format!("{}?mode=rwc", database_url(data_dir));
    let pool = DatabasePool::new(&db_url).await?;

    let cache_dir = config
        .embedding
        .cache_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("models"));
    let encoder = Arc::new(
        FastEmbedEncoder::new(
            &config.embedding,
            cache_dir,
            config.retrieval.embed_batch_size,
        )?,
    );
    let vectors = LanceVectorIndex::new(data_dir.join("vectors")).await?;

    let backends = Backends {
        tenants: Arc::new(SqliteTenantRepository::new(pool.clone())),
        models: Arc::new(SqliteModelSkillRepository::new(pool.clone())),
        retrievals: Arc::new(SqliteRetrievalSkillRepository::new(pool.clone())),
        slus: Arc::new(SqliteSluSkillRepository::new(pool.clone())),
        datasets: Arc::new(SqliteDatasetRepository::new(pool.clone())),
        search: Arc::new(SqliteSearchEngine::new(pool.clone())),
        vectors: Arc::new(vectors),
        trainer: Arc::new(CentroidTrainer::new(Arc::clone(&encoder))),
        loader: Arc::new(CentroidLoader::new(Arc::clone(&encoder))),
        encoder,
        tracker: Arc::new(FileTracker::new(data_dir.join("mlruns"))),
        archiver: Arc::new(GzipArchiver),
        config: Arc::new(config),
        work_dir: data_dir.to_path_buf(),
    };

    tracing::info!(data_dir = %data_dir.display(), "opened local backends");
    Ok(backends)
}

#[cfg(test)]
mod tests {
    use chatskill_core::tenant::registry::TenantRegistry;
    use chatskill_types::tenant::CreateTenantRequest;

    use super::*;

    #[tokio::test]
    async fn test_build_backends_opens_stores_without_loading_models() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let backends = build_backends(&data_dir, ChatskillConfig::default())
            .await
            .unwrap();

        assert!(data_dir.join("chatskill.db").exists());
        assert!(data_dir.join("vectors").is_dir());
        assert!(!data_dir.join("models").exists());
        assert_eq!(backends.export_dir(), data_dir.join("exports"));

        let registry = TenantRegistry::new(backends);
        let tenant = registry
            .create_tenant(CreateTenantRequest {
                description: "travel".into(),
            })
            .await
            .unwrap();
        let session = registry.get_or_create(&tenant.id).await.unwrap();
        assert!(session.skill_types().await.is_empty());
    }
}
