//! A materialized retrieval skill: mount, deploy, and hybrid query.
//!
//! The active vector index lives behind an `Arc` that queries clone and then
//! use without holding any lock. Deploy builds a new index at a fresh
//! location, swaps the persisted pointer with one row update, swaps the
//! in-memory `Arc`, and releases the previous index once the last in-flight
//! query drops it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chatskill_types::dataset::{DatasetId, lexical_index_name};
use chatskill_types::error::SkillError;
use chatskill_types::retrieval::{QueryHit, QueryRequest, RetrievalSkill, VectorEntry};
use chatskill_types::skill::SkillId;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::rankable_units;
use super::scorer::HybridScorer;
use crate::capability::encoder::Encoder;
use crate::capability::search::SearchEngine;
use crate::capability::vector::VectorIndex;
use crate::platform::{Backends, Platform};
use crate::repository::dataset::DatasetRepository;
use crate::repository::retrieval::RetrievalSkillRepository;

/// How often a retired index is checked for remaining readers.
const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// The live index of a deployed skill.
pub struct DeployedIndex<P: Platform> {
    pub location: String,
    pub handle: <P::Vectors as VectorIndex>::Handle,
    pub deploy_time: DateTime<Utc>,
}

pub struct RetrievalSkillRuntime<P: Platform> {
    id: SkillId,
    record: RwLock<RetrievalSkill>,
    deployed: RwLock<Option<Arc<DeployedIndex<P>>>>,
    lock: Arc<Mutex<()>>,
    scorer: HybridScorer,
    backends: Backends<P>,
}

impl<P: Platform> RetrievalSkillRuntime<P> {
    /// Build a runtime from its row, reopening the deployed index if any.
    pub async fn materialize(
        record: RetrievalSkill,
        backends: Backends<P>,
        lock: Arc<Mutex<()>>,
    ) -> Result<Self, SkillError> {
        let deployed = match (&record.deploy_path, record.deploy_time) {
            (Some(location), Some(deploy_time)) => {
                let handle = backends.vectors.open(location).await?;
                Some(Arc::new(DeployedIndex {
                    location: location.clone(),
                    handle,
                    deploy_time,
                }))
            }
            _ => None,
        };

        Ok(Self {
            id: record.id.clone(),
            scorer: HybridScorer::new(backends.config.retrieval.lexical_normalization_ceiling),
            record: RwLock::new(record),
            deployed: RwLock::new(deployed),
            lock,
            backends,
        })
    }

    pub async fn record(&self) -> RetrievalSkill {
        self.record.read().await.clone()
    }

    /// Location of the active vector index, if deployed.
    pub async fn active_location(&self) -> Option<String> {
        self.deployed
            .read()
            .await
            .as_ref()
            .map(|index| index.location.clone())
    }

    /// Mount datasets, keeping only ids that exist and belong to this
    /// skill's tenant. Returns the valid subset, which may be empty.
    pub async fn mount(&self, dataset_ids: &[DatasetId]) -> Result<Vec<DatasetId>, SkillError> {
        if dataset_ids.is_empty() {
            return Err(SkillError::Validation(
                "dataset id list must not be empty".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;
        let skill_id = self.id.clone();
        let tenant_id = self.record.read().await.tenant_id.clone();

        let mut valid: Vec<DatasetId> = Vec::new();
        for id in dataset_ids {
            if valid.contains(id) {
                continue;
            }
            match self.backends.datasets.get_by_id(id).await? {
                Some(dataset) if dataset.tenant_id == tenant_id => valid.push(id.clone()),
                _ => tracing::debug!(skill_id = %skill_id, dataset_id = %id, "dropping invalid dataset id"),
            }
        }

        if !valid.is_empty() {
            self.backends.retrievals.mount(&skill_id, &valid).await?;
            self.record
                .write()
                .await
                .mounted_dataset_ids
                .extend(valid.iter().cloned());
        }

        tracing::info!(
            skill_id = %skill_id,
            requested = dataset_ids.len(),
            mounted = valid.len(),
            "mounted datasets"
        );
        Ok(valid)
    }

    /// Forget a dataset that was deleted elsewhere.
    pub async fn forget_dataset(&self, dataset_id: &DatasetId) {
        self.record
            .write()
            .await
            .mounted_dataset_ids
            .remove(dataset_id);
    }

    /// Build and activate a vector index over every mounted document (and
    /// every sentence of segmented datasets).
    pub async fn deploy(&self) -> Result<RetrievalSkill, SkillError> {
        let _guard = self.lock.lock().await;
        let record = self.record.read().await.clone();

        if record.mounted_dataset_ids.is_empty() {
            return Err(SkillError::Validation(format!(
                "retrieval skill {} does not mount any dataset",
                record.id
            )));
        }

        let mut datasets = Vec::new();
        for id in &record.mounted_dataset_ids {
            if let Some(dataset) = self.backends.datasets.get_by_id(id).await? {
                datasets.push(dataset);
            }
        }
        if datasets.is_empty() {
            return Err(SkillError::Validation(format!(
                "none of the datasets mounted on retrieval skill {} exist",
                record.id
            )));
        }

        let dataset_ids: Vec<DatasetId> = datasets.iter().map(|d| d.id.clone()).collect();
        let segmented: HashSet<DatasetId> = datasets
            .iter()
            .filter(|d| d.segmented)
            .map(|d| d.id.clone())
            .collect();
        let documents = self.backends.datasets.documents(&dataset_ids).await?;
        let units = rankable_units(&documents, &segmented);

        let texts: Vec<String> = units.iter().map(|(_, text)| text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;
        let entries: Vec<VectorEntry> = units
            .into_iter()
            .zip(vectors)
            .map(|((key, _), vector)| VectorEntry { key, vector })
            .collect();

        let location = format!(
            "retrieval_{}_{}",
            record.id.simple(),
            Uuid::now_v7().simple()
        );
        let handle = self
            .backends
            .vectors
            .build(&location, self.backends.encoder.dimension(), &entries)
            .await?;

        let deploy_time = Utc::now();
        if let Err(e) = self
            .backends
            .retrievals
            .set_deployment(&record.id, &location, deploy_time)
            .await
        {
            if let Err(release_err) = self.backends.vectors.release(&location).await {
                tracing::warn!(location = %location, "failed to release unused index: {release_err}");
            }
            return Err(e.into());
        }

        let index = Arc::new(DeployedIndex {
            location: location.clone(),
            handle,
            deploy_time,
        });
        let previous = self.deployed.write().await.replace(index);

        let updated = {
            let mut current = self.record.write().await;
            current.deploy_path = Some(location.clone());
            current.deploy_time = Some(deploy_time);
            current.clone()
        };

        tracing::info!(
            skill_id = %record.id,
            location = %location,
            entries = entries.len(),
            "deployed retrieval skill"
        );

        if let Some(previous) = previous {
            release_when_idle::<P>(Arc::clone(&self.backends.vectors), previous).await;
        }
        Ok(updated)
    }

    /// Rank mounted documents against `request.question`.
    ///
    /// The lexical side searches the datasets mounted now. Candidates whose
    /// document is gone or no longer mounted are dropped before the `top_k`
    /// cut, so a deleted dataset never crowds out live results.
    pub async fn query(&self, request: &QueryRequest) -> Result<Vec<QueryHit>, SkillError> {
        request.validate().map_err(SkillError::Validation)?;

        let deployed = self.deployed.read().await.clone().ok_or_else(|| {
            SkillError::Undeployed(format!("retrieval skill {} has not been deployed", self.id))
        })?;
        let mounted = self.record.read().await.mounted_dataset_ids.clone();
        let lexical_indices: Vec<String> = mounted.iter().map(lexical_index_name).collect();

        let pool = self
            .backends
            .config
            .retrieval
            .candidate_pool
            .max(request.top_k);
        let question = vec![request.question.clone()];

        let (embeddings, lexical) = tokio::try_join!(
            async {
                self.backends
                    .encoder
                    .embed(&question)
                    .await
                    .map_err(SkillError::from)
            },
            async {
                self.backends
                    .search
                    .lexical_query(&lexical_indices, &request.question, pool)
                    .await
                    .map_err(SkillError::from)
            },
        )?;
        let query_vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| SkillError::Storage("encoder returned no vector".to_string()))?;
        let nearest = self
            .backends
            .vectors
            .nearest(&deployed.handle, &query_vector, pool)
            .await?;

        let ranked = self.scorer.fuse(
            &lexical,
            &nearest,
            request.weight,
            request.threshold,
            usize::MAX,
        );
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let mut document_ids: Vec<i64> = ranked.iter().map(|c| c.key.document_id).collect();
        document_ids.sort_unstable();
        document_ids.dedup();
        let documents: HashMap<i64, _> = self
            .backends
            .datasets
            .documents_by_ids(&document_ids)
            .await?
            .into_iter()
            .filter(|doc| mounted.contains(&doc.dataset_id))
            .map(|doc| (doc.id, doc))
            .collect();

        let hits = ranked
            .into_iter()
            .filter_map(|candidate| {
                let document = documents.get(&candidate.key.document_id)?;
                let sentence = match candidate.key.sentence {
                    Some(position) => Some(document.sentences.get(position as usize)?.clone()),
                    None => None,
                };
                Some(QueryHit {
                    document_id: document.id,
                    dataset_id: document.dataset_id.clone(),
                    content: document.content.clone(),
                    attributes: document.attributes.clone(),
                    sentence,
                    sentence_index: candidate.key.sentence,
                    score: candidate.combined,
                    lexical_score: candidate.lexical,
                    embedding_score: candidate.embedding,
                })
            })
            .take(request.top_k)
            .collect();
        Ok(hits)
    }

    /// Deactivate the skill and release its index once idle. Used on delete.
    pub async fn retire(&self) {
        let _guard = self.lock.lock().await;
        if let Some(previous) = self.deployed.write().await.take() {
            release_when_idle::<P>(Arc::clone(&self.backends.vectors), previous).await;
        }
    }

    pub fn id(&self) -> &SkillId {
        &self.id
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SkillError> {
        let batch_size = self.backends.config.retrieval.embed_batch_size.max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let embedded = self.backends.encoder.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(SkillError::Storage(format!(
                    "encoder returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

/// Release `index` now if nothing else holds it, otherwise from a background
/// task once the last in-flight query drops its reference.
pub(crate) async fn release_when_idle<P: Platform>(
    vectors: Arc<P::Vectors>,
    index: Arc<DeployedIndex<P>>,
) {
    match Arc::try_unwrap(index) {
        Ok(index) => release_index::<P>(&vectors, index).await,
        Err(shared) => {
            tokio::spawn(async move {
                let mut shared = shared;
                loop {
                    tokio::time::sleep(RELEASE_POLL_INTERVAL).await;
                    match Arc::try_unwrap(shared) {
                        Ok(index) => {
                            release_index::<P>(&vectors, index).await;
                            break;
                        }
                        Err(still_shared) => shared = still_shared,
                    }
                }
            });
        }
    }
}

async fn release_index<P: Platform>(vectors: &P::Vectors, index: DeployedIndex<P>) {
    let DeployedIndex {
        location, handle, ..
    } = index;
    drop(handle);
    match vectors.release(&location).await {
        Ok(()) => tracing::debug!(location = %location, "released vector index"),
        Err(e) => tracing::warn!(location = %location, "failed to release vector index: {e}"),
    }
}
