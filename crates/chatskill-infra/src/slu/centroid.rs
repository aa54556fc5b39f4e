//! Nearest-centroid intent classifier.
//!
//! Training embeds every utterance with the configured encoder and stores
//! one L2-normalized mean vector per intent. Inference ranks intents by
//! cosine similarity between the question embedding and each centroid.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chatskill_core::capability::encoder::Encoder;
use chatskill_core::capability::slu_model::{SluModel, SluModelLoader};
use chatskill_core::capability::trainer::{TrainedArtifact, Trainer, TrainingJob};
use chatskill_types::error::RepositoryError;
use chatskill_types::model::TrainingExample;
use chatskill_types::skill::SluTask;
use chatskill_types::slu::{IntentScore, SluPrediction};
use serde::{Deserialize, Serialize};

use super::MODEL_FILE;
use super::gazetteer::Gazetteer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentCentroid {
    pub label: String,
    pub centroid: Vec<f32>,
    pub examples: usize,
}

/// On-disk model format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidModelFile {
    pub task: SluTask,
    pub encoder_model: String,
    pub dimension: usize,
    #[serde(default)]
    pub intents: Vec<IntentCentroid>,
    #[serde(default)]
    pub gazetteer: Gazetteer,
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
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

fn rank(intents: &[IntentCentroid], query: &[f32], top_k: usize) -> Vec<IntentScore> {
    let mut scores: Vec<IntentScore> = intents
        .iter()
        .map(|intent| IntentScore {
            label: intent.label.clone(),
            score: cosine(query, &intent.centroid),
        })
        .collect();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.label.cmp(&b.label)));
    scores.truncate(top_k);
    scores
}

async fn embed_batched<E: Encoder>(
    encoder: &E,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, RepositoryError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        vectors.extend(encoder.embed(batch).await?);
    }
    if vectors.len() != texts.len() {
        return Err(RepositoryError::Query(format!(
            "encoder returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        )));
    }
    Ok(vectors)
}

/// Trains [`CentroidModelFile`] artifacts with a shared encoder.
pub struct CentroidTrainer<E: Encoder> {
    encoder: Arc<E>,
}

impl<E: Encoder> CentroidTrainer<E> {
    pub fn new(encoder: Arc<E>) -> Self {
        Self { encoder }
    }

    async fn fit(&self, job: &TrainingJob) -> Result<CentroidModelFile, RepositoryError> {
        let mut intents = Vec::new();
        if job.task.predicts_intent() {
            let labelled: Vec<(&str, &str)> = job
                .train
                .iter()
                .filter_map(|e| e.intent.as_deref().map(|i| (i.trim(), e.text.as_str())))
                .filter(|(i, _)| !i.is_empty())
                .collect();
            let texts = labelled.iter().map(|(_, t)| t.to_string()).collect();
            let vectors =
                embed_batched(self.encoder.as_ref(), texts, job.args.train_batch_size as usize)
                    .await?;

            let mut sums: BTreeMap<&str, (Vec<f32>, usize)> = BTreeMap::new();
            for ((label, _), vector) in labelled.iter().zip(vectors) {
                let (sum, count) = sums
                    .entry(*label)
                    .or_insert_with(|| (vec![0.0; vector.len()], 0));
                sum.iter_mut().zip(&vector).for_each(|(s, v)| *s += v);
                *count += 1;
            }
            intents = sums
                .into_iter()
                .map(|(label, (sum, count))| IntentCentroid {
                    label: label.to_string(),
                    centroid: normalize(sum),
                    examples: count,
                })
                .collect();
        }

        let gazetteer = if job.task.predicts_slot() {
            Gazetteer::from_examples(&job.train)
        } else {
            Gazetteer::default()
        };

        Ok(CentroidModelFile {
            task: job.task,
            encoder_model: self.encoder.model_name().to_string(),
            dimension: self.encoder.dimension(),
            intents,
            gazetteer,
        })
    }

    async fn evaluate(
        &self,
        model: &CentroidModelFile,
        eval: &[TrainingExample],
        batch_size: usize,
    ) -> Result<BTreeMap<String, f64>, RepositoryError> {
        let mut metrics = BTreeMap::from([("eval_size".to_string(), eval.len() as f64)]);
        if eval.is_empty() {
            return Ok(metrics);
        }

        if model.task.predicts_intent() && !model.intents.is_empty() {
            let texts = eval.iter().map(|e| e.text.clone()).collect();
            let vectors = embed_batched(self.encoder.as_ref(), texts, batch_size).await?;
            let correct = eval
                .iter()
                .zip(&vectors)
                .filter(|(example, vector)| {
                    let best = rank(&model.intents, vector, 1);
                    best.first().map(|s| s.label.as_str()) == example.intent.as_deref().map(str::trim)
                })
                .count();
            metrics.insert("accuracy".to_string(), correct as f64 / eval.len() as f64);
        }

        if model.task.predicts_slot() {
            let expected: usize = eval.iter().map(|e| e.slots.len()).sum();
            if expected > 0 {
                let found: usize = eval
                    .iter()
                    .map(|e| {
                        let tagged = model.gazetteer.tag(&e.text);
                        e.slots
                            .iter()
                            .filter(|s| tagged.iter().any(|t| t.label == s.label && t.value == s.value))
                            .count()
                    })
                    .sum();
                metrics.insert("slot_recall".to_string(), found as f64 / expected as f64);
            }
        }
        Ok(metrics)
    }
}

impl<E: Encoder> Trainer for CentroidTrainer<E> {
    async fn train(&self, job: &TrainingJob) -> Result<TrainedArtifact, RepositoryError> {
        let model = self.fit(job).await?;
        let mut metrics = self
            .evaluate(&model, &job.eval, job.args.train_batch_size as usize)
            .await?;
        metrics.insert("train_size".to_string(), job.train.len() as f64);
        metrics.insert("intents".to_string(), model.intents.len() as f64);
        metrics.insert("slot_values".to_string(), model.gazetteer.len() as f64);

        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to create {}: {e}", job.output_dir.display())))?;
        let json = serde_json::to_vec(&model).map_err(|e| RepositoryError::Query(e.to_string()))?;
        let path = job.output_dir.join(MODEL_FILE);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to write {}: {e}", path.display())))?;

        tracing::info!(
            task = %job.task,
            intents = model.intents.len(),
            slot_values = model.gazetteer.len(),
            "trained centroid model"
        );
        Ok(TrainedArtifact {
            artifact_dir: job.output_dir.clone(),
            metrics,
        })
    }
}

/// A loaded centroid model bound to the encoder it was trained with.
pub struct CentroidModel<E: Encoder> {
    file: CentroidModelFile,
    encoder: Arc<E>,
}

impl<E: Encoder> SluModel for CentroidModel<E> {
    fn task(&self) -> SluTask {
        self.file.task
    }

    async fn predict(&self, text: &str, top_k: usize) -> Result<SluPrediction, RepositoryError> {
        let intents = if self.file.task.predicts_intent() && !self.file.intents.is_empty() {
            let query = self
                .encoder
                .embed(&[text.to_string()])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| RepositoryError::Query("encoder returned no vector".to_string()))?;
            rank(&self.file.intents, &query, top_k)
        } else {
            Vec::new()
        };

        let slots = if self.file.task.predicts_slot() {
            self.file.gazetteer.tag(text)
        } else {
            Vec::new()
        };
        Ok(SluPrediction { intents, slots })
    }
}

pub struct CentroidLoader<E: Encoder> {
    encoder: Arc<E>,
}

impl<E: Encoder> CentroidLoader<E> {
    pub fn new(encoder: Arc<E>) -> Self {
        Self { encoder }
    }
}

impl<E: Encoder + 'static> SluModelLoader for CentroidLoader<E> {
    type Model = CentroidModel<E>;

    async fn load(&self, artifact_dir: &Path) -> Result<CentroidModel<E>, RepositoryError> {
        let path = artifact_dir.join(MODEL_FILE);
        let json = match tokio::fs::read(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepositoryError::NotFound);
            }
            Err(e) => {
                return Err(RepositoryError::Query(format!("failed to read {}: {e}", path.display())));
            }
        };
        let file: CentroidModelFile = serde_json::from_slice(&json)
            .map_err(|e| RepositoryError::Query(format!("invalid model file: {e}")))?;

        if file.dimension != self.encoder.dimension() {
            return Err(RepositoryError::Query(format!(
                "model was trained with {}-dimensional {} embeddings, the encoder produces {}",
                file.dimension,
                file.encoder_model,
                self.encoder.dimension()
            )));
        }
        if file.encoder_model != self.encoder.model_name() {
            tracing::warn!(
                trained_with = %file.encoder_model,
                encoder = %self.encoder.model_name(),
                "model was trained with a different encoder"
            );
        }

        Ok(CentroidModel {
            file,
            encoder: Arc::clone(&self.encoder),
        })
    }
}
