//! In-memory port implementations for core tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chatskill_types::config::ChatskillConfig;
use chatskill_types::dataset::{DatasetId, Document, NewDocument, RetrievalDataset};
use chatskill_types::error::RepositoryError;
use chatskill_types::model::{ModelManifest, ModelSkill, RunRecord, TrainingExample};
use chatskill_types::retrieval::{IndexEntry, LexicalHit, NearestHit, RetrievalSkill, VectorEntry};
use chatskill_types::skill::{SkillId, SluTask};
use chatskill_types::slu::{IntentScore, SluPrediction, SluSkill, SlotValue};
use chatskill_types::tenant::{Tenant, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::archive::ModelArchiver;
use crate::capability::encoder::Encoder;
use crate::capability::search::SearchEngine;
use crate::capability::slu_model::{SluModel, SluModelLoader};
use crate::capability::tracker::ExperimentTracker;
use crate::capability::trainer::{TrainedArtifact, Trainer, TrainingJob};
use crate::capability::vector::VectorIndex;
use crate::platform::{Backends, Platform};
use crate::repository::dataset::DatasetRepository;
use crate::repository::model::ModelSkillRepository;
use crate::repository::retrieval::RetrievalSkillRepository;
use crate::repository::slu::SluSkillRepository;
use crate::repository::tenant::TenantRepository;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    tenants: Vec<Tenant>,
    models: BTreeMap<SkillId, ModelSkill>,
    retrievals: BTreeMap<SkillId, RetrievalSkill>,
    slus: BTreeMap<SkillId, SluSkill>,
    datasets: BTreeMap<DatasetId, RetrievalDataset>,
    documents: Vec<Document>,
    next_document_id: i64,
}

/// Every repository over one mutex-guarded state.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<StoreState>,
}

impl MemStore {
    fn with<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }
}

impl TenantRepository for MemStore {
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, RepositoryError> {
        self.with(|s| s.tenants.push(tenant.clone()));
        Ok(tenant.clone())
    }

    async fn get_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        Ok(self.with(|s| s.tenants.iter().find(|t| &t.id == id).cloned()))
    }

    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError> {
        Ok(self.with(|s| s.tenants.clone()))
    }

    async fn delete(&self, id: &TenantId) -> Result<(), RepositoryError> {
        self.with(|s| {
            s.tenants.retain(|t| &t.id != id);
            s.models.retain(|_, m| &m.tenant_id != id);
            s.retrievals.retain(|_, r| &r.tenant_id != id);
            s.slus.retain(|_, r| &r.tenant_id != id);
            let owned: HashSet<DatasetId> = s
                .datasets
                .values()
                .filter(|d| &d.tenant_id == id)
                .map(|d| d.id.clone())
                .collect();
            s.datasets.retain(|k, _| !owned.contains(k));
            s.documents.retain(|d| !owned.contains(&d.dataset_id));
        });
        Ok(())
    }
}

impl ModelSkillRepository for MemStore {
    async fn create(&self, model: &ModelSkill) -> Result<ModelSkill, RepositoryError> {
        self.with(|s| s.models.insert(model.id.clone(), model.clone()));
        Ok(model.clone())
    }

    async fn get_by_id(&self, id: &SkillId) -> Result<Option<ModelSkill>, RepositoryError> {
        Ok(self.with(|s| s.models.get(id).cloned()))
    }

    async fn list_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<ModelSkill>, RepositoryError> {
        Ok(self.with(|s| {
            s.models
                .values()
                .filter(|m| &m.tenant_id == tenant_id)
                .cloned()
                .collect()
        }))
    }

    async fn update(&self, model: &ModelSkill) -> Result<ModelSkill, RepositoryError> {
        self.with(|s| match s.models.get_mut(&model.id) {
            Some(stored) => {
                *stored = model.clone();
                Ok(model.clone())
            }
            None => Err(RepositoryError::NotFound),
        })
    }

    async fn delete(&self, id: &SkillId) -> Result<(), RepositoryError> {
        self.with(|s| s.models.remove(id));
        Ok(())
    }

    async fn count_by_tenant(&self, tenant_id: &TenantId) -> Result<i64, RepositoryError> {
        Ok(self.with(|s| s.models.values().filter(|m| &m.tenant_id == tenant_id).count() as i64))
    }
}

impl RetrievalSkillRepository for MemStore {
    async fn create(&self, skill: &RetrievalSkill) -> Result<RetrievalSkill, RepositoryError> {
        self.with(|s| s.retrievals.insert(skill.id.clone(), skill.clone()));
        Ok(skill.clone())
    }

    async fn get_by_id(&self, id: &SkillId) -> Result<Option<RetrievalSkill>, RepositoryError> {
        Ok(self.with(|s| s.retrievals.get(id).cloned()))
    }

    async fn list_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<RetrievalSkill>, RepositoryError> {
        Ok(self.with(|s| {
            s.retrievals
                .values()
                .filter(|r| &r.tenant_id == tenant_id)
                .cloned()
                .collect()
        }))
    }

    async fn delete(&self, id: &SkillId) -> Result<(), RepositoryError> {
        self.with(|s| s.retrievals.remove(id));
        Ok(())
    }

    async fn count_by_tenant(&self, tenant_id: &TenantId) -> Result<i64, RepositoryError> {
        Ok(self.with(|s| {
            s.retrievals
                .values()
                .filter(|r| &r.tenant_id == tenant_id)
                .count() as i64
        }))
    }

    async fn mount(&self, id: &SkillId, dataset_ids: &[DatasetId]) -> Result<(), RepositoryError> {
        self.with(|s| match s.retrievals.get_mut(id) {
            Some(skill) => {
                skill.mounted_dataset_ids.extend(dataset_ids.iter().cloned());
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        })
    }

    async fn set_deployment(
        &self,
        id: &SkillId,
        deploy_path: &str,
        deploy_time: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.with(|s| match s.retrievals.get_mut(id) {
            Some(skill) => {
                skill.deploy_path = Some(deploy_path.to_string());
                skill.deploy_time = Some(deploy_time);
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        })
    }
}

impl SluSkillRepository for MemStore {
    async fn create(&self, skill: &SluSkill) -> Result<SluSkill, RepositoryError> {
        self.with(|s| s.slus.insert(skill.id.clone(), skill.clone()));
        Ok(skill.clone())
    }

    async fn get_by_id(&self, id: &SkillId) -> Result<Option<SluSkill>, RepositoryError> {
        Ok(self.with(|s| s.slus.get(id).cloned()))
    }

    async fn list_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<SluSkill>, RepositoryError> {
        Ok(self.with(|s| {
            s.slus
                .values()
                .filter(|r| &r.tenant_id == tenant_id)
                .cloned()
                .collect()
        }))
    }

    async fn update(&self, skill: &SluSkill) -> Result<SluSkill, RepositoryError> {
        self.with(|s| match s.slus.get_mut(&skill.id) {
            Some(stored) => {
                *stored = skill.clone();
                Ok(skill.clone())
            }
            None => Err(RepositoryError::NotFound),
        })
    }

    async fn delete(&self, id: &SkillId) -> Result<(), RepositoryError> {
        self.with(|s| s.slus.remove(id));
        Ok(())
    }

    async fn count_by_tenant(&self, tenant_id: &TenantId) -> Result<i64, RepositoryError> {
        Ok(self.with(|s| s.slus.values().filter(|r| &r.tenant_id == tenant_id).count() as i64))
    }
}

impl DatasetRepository for MemStore {
    async fn create(
        &self,
        dataset: &RetrievalDataset,
        documents: &[NewDocument],
    ) -> Result<(RetrievalDataset, Vec<Document>), RepositoryError> {
        Ok(self.with(|s| {
            s.datasets.insert(dataset.id.clone(), dataset.clone());
            let mut stored = Vec::with_capacity(documents.len());
            for doc in documents {
                s.next_document_id += 1;
                let document = Document {
                    id: s.next_document_id,
                    dataset_id: dataset.id.clone(),
                    content: doc.content.clone(),
                    attributes: doc.attributes.clone(),
                    sentences: doc.sentences.clone(),
                };
                s.documents.push(document.clone());
                stored.push(document);
            }
            (dataset.clone(), stored)
        }))
    }

    async fn get_by_id(&self, id: &DatasetId) -> Result<Option<RetrievalDataset>, RepositoryError> {
        Ok(self.with(|s| s.datasets.get(id).cloned()))
    }

    async fn list_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<RetrievalDataset>, RepositoryError> {
        Ok(self.with(|s| {
            s.datasets
                .values()
                .filter(|d| &d.tenant_id == tenant_id)
                .cloned()
                .collect()
        }))
    }

    async fn documents(&self, dataset_ids: &[DatasetId]) -> Result<Vec<Document>, RepositoryError> {
        Ok(self.with(|s| {
            s.documents
                .iter()
                .filter(|d| dataset_ids.contains(&d.dataset_id))
                .cloned()
                .collect()
        }))
    }

    async fn documents_by_ids(&self, ids: &[i64]) -> Result<Vec<Document>, RepositoryError> {
        Ok(self.with(|s| {
            s.documents
                .iter()
                .filter(|d| ids.contains(&d.id))
                .cloned()
                .collect()
        }))
    }

    async fn unmount_everywhere(&self, id: &DatasetId) -> Result<Vec<SkillId>, RepositoryError> {
        Ok(self.with(|s| {
            let mut affected = Vec::new();
            for skill in s.retrievals.values_mut() {
                if skill.mounted_dataset_ids.remove(id) {
                    affected.push(skill.id.clone());
                }
            }
            affected
        }))
    }

    async fn delete(&self, id: &DatasetId) -> Result<(), RepositoryError> {
        self.with(|s| {
            s.datasets.remove(id);
            s.documents.retain(|d| &d.dataset_id != id);
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Encoder and search
// ---------------------------------------------------------------------------

const FAKE_DIMENSION: usize = 16;

/// Bag-of-characters encoder: similar spellings give similar vectors.
#[derive(Default)]
pub struct FakeEncoder {
    pub calls: AtomicUsize,
}

impl Encoder for FakeEncoder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; FAKE_DIMENSION];
                for c in text.to_lowercase().chars().filter(|c| c.is_alphanumeric()) {
                    v[c as usize % FAKE_DIMENSION] += 1.0;
                }
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    v.iter_mut().for_each(|x| *x /= norm);
                }
                v
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "fake-bag-of-chars"
    }

    fn dimension(&self) -> usize {
        FAKE_DIMENSION
    }
}

fn trigrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    chars
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

/// Shared trigram count between two texts.
pub fn trigram_overlap(a: &str, b: &str) -> usize {
    trigrams(a).intersection(&trigrams(b)).count()
}

/// Lexical search scoring by shared character trigrams.
#[derive(Default)]
pub struct MemSearch {
    indices: Mutex<HashMap<String, Vec<IndexEntry>>>,
}

impl SearchEngine for MemSearch {
    async fn create_index(&self, name: &str) -> Result<(), RepositoryError> {
        let mut indices = self.indices.lock().unwrap();
        if indices.contains_key(name) {
            return Err(RepositoryError::Conflict(format!("index {name} exists")));
        }
        indices.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn index_entries(&self, name: &str, entries: &[IndexEntry]) -> Result<(), RepositoryError> {
        let mut indices = self.indices.lock().unwrap();
        let index = indices.get_mut(name).ok_or(RepositoryError::NotFound)?;
        index.extend(entries.iter().cloned());
        Ok(())
    }

    async fn lexical_query(
        &self,
        indices: &[String],
        text: &str,
        top_n: usize,
    ) -> Result<Vec<LexicalHit>, RepositoryError> {
        let stored = self.indices.lock().unwrap();
        let mut hits: Vec<LexicalHit> = indices
            .iter()
            .filter_map(|name| stored.get(name))
            .flatten()
            .filter_map(|entry| {
                let score = trigram_overlap(text, &entry.text) as f32;
                (score > 0.0).then(|| LexicalHit {
                    key: entry.key,
                    text: entry.text.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.key.cmp(&b.key)));
        hits.truncate(top_n);
        Ok(hits)
    }

    async fn index_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.indices.lock().unwrap().contains_key(name))
    }

    async fn delete_index(&self, name: &str) -> Result<(), RepositoryError> {
        self.indices.lock().unwrap().remove(name);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Vector index
// ---------------------------------------------------------------------------

/// Brute-force cosine index. Tracks which locations are live.
#[derive(Default)]
pub struct MemVectors {
    built: Mutex<HashMap<String, Arc<Vec<VectorEntry>>>>,
}

impl MemVectors {
    pub fn live_locations(&self) -> Vec<String> {
        let mut locations: Vec<String> = self.built.lock().unwrap().keys().cloned().collect();
        locations.sort();
        locations
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

impl VectorIndex for MemVectors {
    type Handle = Arc<Vec<VectorEntry>>;

    async fn build(
        &self,
        location: &str,
        dimension: usize,
        entries: &[VectorEntry],
    ) -> Result<Self::Handle, RepositoryError> {
        if entries.iter().any(|e| e.vector.len() != dimension) {
            return Err(RepositoryError::Query("dimension mismatch".to_string()));
        }
        let handle = Arc::new(entries.to_vec());
        self.built
            .lock()
            .unwrap()
            .insert(location.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    async fn open(&self, location: &str) -> Result<Self::Handle, RepositoryError> {
        self.built
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn nearest(
        &self,
        handle: &Self::Handle,
        query: &[f32],
        top_n: usize,
    ) -> Result<Vec<NearestHit>, RepositoryError> {
        let mut hits: Vec<NearestHit> = handle
            .iter()
            .map(|entry| NearestHit {
                key: entry.key,
                cosine: cosine(&entry.vector, query),
            })
            .collect();
        hits.sort_by(|a, b| b.cosine.total_cmp(&a.cosine).then(a.key.cmp(&b.key)));
        hits.truncate(top_n);
        Ok(hits)
    }

    async fn release(&self, location: &str) -> Result<(), RepositoryError> {
        self.built.lock().unwrap().remove(location);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Training, tracking, archives, models
// ---------------------------------------------------------------------------

const MODEL_FILE: &str = "model.json";

#[derive(Serialize, Deserialize)]
struct FakeModelFile {
    task: SluTask,
    examples: Vec<TrainingExample>,
}

/// Trainer that memorizes its training set.
#[derive(Default)]
pub struct FakeTrainer {
    pub fail: AtomicBool,
    pub runs: AtomicUsize,
}

impl Trainer for FakeTrainer {
    async fn train(&self, job: &TrainingJob) -> Result<TrainedArtifact, RepositoryError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("trainer crashed".to_string()));
        }
        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let file = FakeModelFile {
            task: job.task,
            examples: job.train.clone(),
        };
        let json = serde_json::to_string(&file).map_err(|e| RepositoryError::Query(e.to_string()))?;
        tokio::fs::write(job.output_dir.join(MODEL_FILE), json)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(TrainedArtifact {
            artifact_dir: job.output_dir.clone(),
            metrics: BTreeMap::from([
                ("accuracy".to_string(), 0.9),
                ("eval_size".to_string(), job.eval.len() as f64),
            ]),
        })
    }
}

/// Filesystem-backed tracker with in-memory run metadata.
pub struct MemTracker {
    root: PathBuf,
    runs: Mutex<HashMap<String, RunRecord>>,
}

impl MemTracker {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    fn update(&self, run_id: &str, f: impl FnOnce(&mut RunRecord)) -> Result<(), RepositoryError> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs.get_mut(run_id).ok_or(RepositoryError::NotFound)?;
        f(run);
        Ok(())
    }
}

async fn copy_flat(from: &Path, to: &Path) -> Result<(), RepositoryError> {
    let io = |e: std::io::Error| RepositoryError::Query(e.to_string());
    tokio::fs::create_dir_all(to).await.map_err(io)?;
    let mut entries = tokio::fs::read_dir(from).await.map_err(io)?;
    while let Some(entry) = entries.next_entry().await.map_err(io)? {
        tokio::fs::copy(entry.path(), to.join(entry.file_name()))
            .await
            .map_err(io)?;
    }
    Ok(())
}

impl ExperimentTracker for MemTracker {
    fn tracking_uri(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn create_run(&self, namespace: &str, name: &str) -> Result<String, RepositoryError> {
        let run_id = uuid::Uuid::now_v7().simple().to_string();
        self.runs.lock().unwrap().insert(
            run_id.clone(),
            RunRecord {
                run_id: run_id.clone(),
                namespace: namespace.to_string(),
                name: name.to_string(),
                ..RunRecord::default()
            },
        );
        Ok(run_id)
    }

    async fn log_params(
        &self,
        run_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), RepositoryError> {
        self.update(run_id, |run| run.params.extend(params.clone()))
    }

    async fn log_metrics(
        &self,
        run_id: &str,
        metrics: &BTreeMap<String, f64>,
    ) -> Result<(), RepositoryError> {
        self.update(run_id, |run| run.metrics.extend(metrics.clone()))
    }

    async fn set_tags(
        &self,
        run_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), RepositoryError> {
        self.update(run_id, |run| run.tags.extend(tags.clone()))
    }

    async fn log_artifacts(&self, run_id: &str, local_dir: &Path) -> Result<String, RepositoryError> {
        let dest = self.root.join(run_id);
        copy_flat(local_dir, &dest).await?;
        Ok(format!("file://{}", dest.display()))
    }

    async fn get_artifact(&self, run_id: &str) -> Result<PathBuf, RepositoryError> {
        if !self.runs.lock().unwrap().contains_key(run_id) {
            return Err(RepositoryError::NotFound);
        }
        Ok(self.root.join(run_id))
    }

    async fn get_run(&self, run_id: &str) -> Result<RunRecord, RepositoryError> {
        self.runs
            .lock()
            .unwrap()
            .get(run_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_tags(&self, run_id: &str) -> Result<BTreeMap<String, String>, RepositoryError> {
        Ok(self.get_run(run_id).await?.tags)
    }

    async fn delete_run(&self, run_id: &str) -> Result<(), RepositoryError> {
        self.runs.lock().unwrap().remove(run_id);
        let _ = tokio::fs::remove_dir_all(self.root.join(run_id)).await;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct FakeArchive {
    manifest: ModelManifest,
    files: BTreeMap<String, String>,
}

/// Plain JSON archive of text artifact files.
#[derive(Default)]
pub struct JsonArchiver;

impl ModelArchiver for JsonArchiver {
    async fn pack(
        &self,
        manifest: &ModelManifest,
        artifact_dir: &Path,
        dest: &Path,
    ) -> Result<(), RepositoryError> {
        let io = |e: std::io::Error| RepositoryError::Query(e.to_string());
        let mut files = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(artifact_dir).await.map_err(io)?;
        while let Some(entry) = entries.next_entry().await.map_err(io)? {
            let content = tokio::fs::read_to_string(entry.path()).await.map_err(io)?;
            files.insert(entry.file_name().to_string_lossy().into_owned(), content);
        }
        let archive = FakeArchive {
            manifest: manifest.clone(),
            files,
        };
        let json = serde_json::to_vec(&archive).map_err(|e| RepositoryError::Query(e.to_string()))?;
        tokio::fs::write(dest, json).await.map_err(io)
    }

    async fn unpack(&self, archive: &Path, dest_dir: &Path) -> Result<ModelManifest, RepositoryError> {
        let io = |e: std::io::Error| RepositoryError::Query(e.to_string());
        let bytes = tokio::fs::read(archive).await.map_err(io)?;
        let archive: FakeArchive =
            serde_json::from_slice(&bytes).map_err(|e| RepositoryError::Query(e.to_string()))?;
        tokio::fs::create_dir_all(dest_dir).await.map_err(io)?;
        for (name, content) in &archive.files {
            tokio::fs::write(dest_dir.join(name), content).await.map_err(io)?;
        }
        Ok(archive.manifest)
    }
}

/// Nearest-example intent classifier with exact-match slot lookup.
pub struct FakeModel {
    task: SluTask,
    examples: Vec<TrainingExample>,
}

impl SluModel for FakeModel {
    fn task(&self) -> SluTask {
        self.task
    }

    async fn predict(&self, text: &str, top_k: usize) -> Result<SluPrediction, RepositoryError> {
        let mut scores: BTreeMap<String, usize> = BTreeMap::new();
        for example in &self.examples {
            if let Some(intent) = &example.intent {
                let overlap = trigram_overlap(text, &example.text);
                let best = scores.entry(intent.clone()).or_default();
                *best = (*best).max(overlap);
            }
        }
        let mut intents: Vec<IntentScore> = scores
            .into_iter()
            .map(|(label, score)| IntentScore {
                label,
                score: score as f32,
            })
            .collect();
        intents.sort_by(|a, b| b.score.total_cmp(&a.score));
        intents.truncate(top_k);

        let mut slots: Vec<SlotValue> = Vec::new();
        for slot in self.examples.iter().flat_map(|e| &e.slots) {
            if let Some(byte) = text.find(&slot.value) {
                let value = SlotValue {
                    label: slot.label.clone(),
                    value: slot.value.clone(),
                    start: text[..byte].chars().count(),
                };
                if !slots.contains(&value) {
                    slots.push(value);
                }
            }
        }
        Ok(SluPrediction { intents, slots })
    }
}

#[derive(Default)]
pub struct FakeLoader {
    pub loads: AtomicUsize,
}

impl SluModelLoader for FakeLoader {
    type Model = FakeModel;

    async fn load(&self, artifact_dir: &Path) -> Result<FakeModel, RepositoryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let json = tokio::fs::read_to_string(artifact_dir.join(MODEL_FILE))
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let file: FakeModelFile =
            serde_json::from_str(&json).map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(FakeModel {
            task: file.task,
            examples: file.examples,
        })
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

pub struct TestPlatform;

impl Platform for TestPlatform {
    type Tenants = MemStore;
    type Models = MemStore;
    type Retrievals = MemStore;
    type Slus = MemStore;
    type Datasets = MemStore;
    type Encoder = FakeEncoder;
    type Search = MemSearch;
    type Vectors = MemVectors;
    type Trainer = FakeTrainer;
    type Tracker = MemTracker;
    type Loader = FakeLoader;
    type Archiver = JsonArchiver;
}

/// Backends plus direct handles on the fakes for assertions.
pub struct Harness {
    pub backends: Backends<TestPlatform>,
    pub store: Arc<MemStore>,
    pub search: Arc<MemSearch>,
    pub vectors: Arc<MemVectors>,
    pub trainer: Arc<FakeTrainer>,
    pub tracker: Arc<MemTracker>,
    pub loader: Arc<FakeLoader>,
}

pub fn harness(work_dir: &Path) -> Harness {
    let store = Arc::new(MemStore::default());
    let search = Arc::new(MemSearch::default());
    let vectors = Arc::new(MemVectors::default());
    let trainer = Arc::new(FakeTrainer::default());
    let tracker = Arc::new(MemTracker::new(work_dir.join("mlruns")));
    let loader = Arc::new(FakeLoader::default());

    let backends = Backends {
        tenants: Arc::clone(&store),
        models: Arc::clone(&store),
        retrievals: Arc::clone(&store),
        slus: Arc::clone(&store),
        datasets: Arc::clone(&store),
        encoder: Arc::new(FakeEncoder::default()),
        search: Arc::clone(&search),
        vectors: Arc::clone(&vectors),
        trainer: Arc::clone(&trainer),
        tracker: Arc::clone(&tracker),
        loader: Arc::clone(&loader),
        archiver: Arc::new(JsonArchiver),
        config: Arc::new(ChatskillConfig::default()),
        work_dir: work_dir.to_path_buf(),
    };

    Harness {
        backends,
        store,
        search,
        vectors,
        trainer,
        tracker,
        loader,
    }
}
