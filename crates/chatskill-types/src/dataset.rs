//! Retrieval datasets and their documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::id::DatasetId;
use crate::tenant::TenantId;

/// A named collection of documents a retrieval skill can mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDataset {
    pub id: DatasetId,
    pub tenant_id: TenantId,
    pub name: String,
    /// When true, every document is split into ordered sentences that are
    /// indexed and ranked individually.
    pub segmented: bool,
    pub document_count: i64,
    pub created_at: DateTime<Utc>,
}

impl RetrievalDataset {
    /// Name of the lexical index holding this dataset's entries.
    pub fn lexical_index_name(&self) -> String {
        lexical_index_name(&self.id)
    }
}

/// Lexical index name for a dataset id.
pub fn lexical_index_name(id: &DatasetId) -> String {
    format!("dataset_{}", id.simple())
}

/// A stored document. Ids ascend in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub dataset_id: DatasetId,
    pub content: String,
    /// Arbitrary caller-supplied attributes, returned verbatim with hits.
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Ordered sentence segments; empty for non-segmented datasets.
    #[serde(default)]
    pub sentences: Vec<String>,
}

/// A document as supplied at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub content: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub sentences: Vec<String>,
}

impl NewDocument {
    /// Build a document from an uploaded JSON object: `content` is required,
    /// every other key becomes an attribute.
    pub fn from_json_object(
        mut object: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, String> {
        let content = match object.remove("content") {
            Some(serde_json::Value::String(content)) if !content.trim().is_empty() => content,
            Some(_) => return Err("'content' must be a non-empty string".to_string()),
            None => return Err("missing required 'content' attribute".to_string()),
        };
        Ok(Self {
            content,
            attributes: object,
            sentences: Vec::new(),
        })
    }
}

/// Request to create a dataset together with its documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDatasetRequest {
    pub name: String,
    #[serde(default)]
    pub segment: bool,
    pub documents: Vec<NewDocument>,
}
