//! Retrieval skill records, query inputs/outputs, and index entry types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetId;
use crate::skill::SkillId;
use crate::tenant::TenantId;

/// A hybrid document-retrieval skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSkill {
    pub id: SkillId,
    pub tenant_id: TenantId,
    pub name: String,
    pub mounted_dataset_ids: BTreeSet<DatasetId>,
    /// Location of the active vector index.
    pub deploy_path: Option<String>,
    /// Set once deployed; queries are rejected while `None`.
    pub deploy_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RetrievalSkill {
    pub fn is_deployed(&self) -> bool {
        self.deploy_time.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRetrievalSkillRequest {
    pub name: String,
}

fn default_weight() -> f32 {
    0.5
}

fn default_top_k() -> usize {
    10
}

/// A hybrid retrieval query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// 1.0 ranks purely by lexical score, 0.0 purely by embedding similarity.
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Candidates scoring below this are dropped.
    #[serde(default)]
    pub threshold: f32,
    #[serde(default = "default_top_k", alias = "num_results")]
    pub top_k: usize,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            weight: default_weight(),
            threshold: 0.0,
            top_k: default_top_k(),
        }
    }

    /// Check ranges: weight and threshold in [0, 1], top_k at least 1.
    pub fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("question must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(format!("weight must be within [0, 1], got {}", self.weight));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            ));
        }
        if self.top_k == 0 {
            return Err("top_k must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Identifies a rankable unit: a whole document or one of its sentences.
///
/// Ordering (document id, then sentence position, whole document first) is
/// the tie-break order for equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateKey {
    pub document_id: i64,
    pub sentence: Option<u32>,
}

impl CandidateKey {
    pub fn document(document_id: i64) -> Self {
        Self {
            document_id,
            sentence: None,
        }
    }

    pub fn sentence(document_id: i64, position: u32) -> Self {
        Self {
            document_id,
            sentence: Some(position),
        }
    }
}

/// Text handed to the lexical search engine.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key: CandidateKey,
    pub text: String,
}

/// A lexical match with its raw (unnormalized, higher is better) relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub key: CandidateKey,
    pub text: String,
    pub score: f32,
}

/// An embedding stored in a vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub key: CandidateKey,
    pub vector: Vec<f32>,
}

/// A nearest-neighbour match with raw cosine similarity in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHit {
    pub key: CandidateKey,
    pub cosine: f32,
}

/// One ranked retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub document_id: i64,
    pub dataset_id: DatasetId,
    pub content: String,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence_index: Option<u32>,
    pub score: f32,
    pub lexical_score: f32,
    pub embedding_score: f32,
}
