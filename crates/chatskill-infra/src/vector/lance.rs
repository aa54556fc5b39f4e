//! LanceDB-backed vector index.
//!
//! Every deploy location is a table in one LanceDB database directory.
//! Tables are written once by `build` and only read afterwards, so open
//! handles never observe a partial index.

use std::path::PathBuf;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator,
};
use arrow_schema::{DataType, Field};
use chatskill_core::capability::vector::VectorIndex;
use chatskill_types::error::RepositoryError;
use chatskill_types::retrieval::{CandidateKey, NearestHit, VectorEntry};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::schema::retrieval_index_schema;

/// Nearest-neighbour search over LanceDB tables.
pub struct LanceVectorIndex {
    db: lancedb::Connection,
    base_path: PathBuf,
}

fn lance_err(context: &str) -> impl Fn(lancedb::Error) -> RepositoryError + '_ {
    move |e| RepositoryError::Query(format!("{context}: {e}"))
}

impl LanceVectorIndex {
    /// Open or create the database directory at `base_path`.
    pub async fn new(base_path: PathBuf) -> Result<Self, RepositoryError> {
        tokio::fs::create_dir_all(&base_path)
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to create {}: {e}", base_path.display())))?;

        let uri = base_path.to_str().ok_or_else(|| {
            RepositoryError::Query(format!(
                "path contains invalid UTF-8: {}",
                base_path.display()
            ))
        })?;
        let db = lancedb::connect(uri)
            .execute()
            .await
            .map_err(lance_err("failed to open vector store"))?;

        Ok(Self { db, base_path })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    pub async fn table_names(&self) -> Result<Vec<String>, RepositoryError> {
        self.db
            .table_names()
            .execute()
            .await
            .map_err(lance_err("failed to list tables"))
    }

    fn build_record_batch(
        dimension: usize,
        entries: &[VectorEntry],
    ) -> Result<RecordBatch, RepositoryError> {
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(RepositoryError::Query(format!(
                "vector of document {} has {} dimensions, expected {dimension}",
                bad.key.document_id,
                bad.vector.len()
            )));
        }

        let dim = dimension as i32;
        let document_ids = Int64Array::from_iter_values(entries.iter().map(|e| e.key.document_id));
        let sentences: Int32Array = entries
            .iter()
            .map(|e| e.key.sentence.map(|s| s as i32))
            .collect();
        let values = Float32Array::from_iter_values(entries.iter().flat_map(|e| e.vector.iter().copied()));
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::new(field, dim, Arc::new(values), None);

        RecordBatch::try_new(
            Arc::new(retrieval_index_schema(dim)),
            vec![Arc::new(document_ids), Arc::new(sentences), Arc::new(vectors)],
        )
        .map_err(|e| RepositoryError::Query(format!("failed to build record batch: {e}")))
    }

    fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<NearestHit>, RepositoryError> {
        let missing = |name: &str| RepositoryError::Query(format!("result batch lacks {name}"));
        let document_ids = batch
            .column_by_name("document_id")
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .ok_or_else(|| missing("document_id"))?;
        let sentences = batch
            .column_by_name("sentence")
            .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
            .ok_or_else(|| missing("sentence"))?;
        // Added by LanceDB vector search
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| missing("_distance"))?;

        Ok((0..batch.num_rows())
            .map(|i| {
                let key = if sentences.is_null(i) {
                    CandidateKey::document(document_ids.value(i))
                } else {
                    CandidateKey::sentence(document_ids.value(i), sentences.value(i) as u32)
                };
                NearestHit {
                    key,
                    cosine: (1.0 - distances.value(i)).clamp(-1.0, 1.0),
                }
            })
            .collect())
    }
}

impl VectorIndex for LanceVectorIndex {
    type Handle = lancedb::Table;

    async fn build(
        &self,
        location: &str,
        dimension: usize,
        entries: &[VectorEntry],
    ) -> Result<lancedb::Table, RepositoryError> {
        let batch = if entries.is_empty() {
            None
        } else {
            Some(Self::build_record_batch(dimension, entries)?)
        };

        let schema = Arc::new(retrieval_index_schema(dimension as i32));
        let table = self
            .db
            .create_empty_table(location, Arc::clone(&schema))
            .execute()
            .await
            .map_err(lance_err("failed to create index table"))?;

        if let Some(batch) = batch {
            let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
            if let Err(e) = table.add(reader).execute().await {
                self.release(location).await?;
                return Err(RepositoryError::Query(format!("failed to write index: {e}")));
            }
        }

        tracing::debug!(location = %location, entries = entries.len(), "built vector index");
        Ok(table)
    }

    async fn open(&self, location: &str) -> Result<lancedb::Table, RepositoryError> {
        match self.db.open_table(location).execute().await {
            Ok(table) => Ok(table),
            Err(lancedb::Error::TableNotFound { .. }) => Err(RepositoryError::NotFound),
            Err(e) => Err(RepositoryError::Query(format!("failed to open index: {e}"))),
        }
    }

    async fn nearest(
        &self,
        handle: &lancedb::Table,
        query: &[f32],
        top_n: usize,
    ) -> Result<Vec<NearestHit>, RepositoryError> {
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let results = handle
            .vector_search(query)
            .map_err(lance_err("vector search setup failed"))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(top_n)
            .execute()
            .await
            .map_err(lance_err("vector search failed"))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(lance_err("failed to collect results"))?;

        let mut hits = Vec::new();
        for batch in batches.iter().filter(|b| b.num_rows() > 0) {
            hits.extend(Self::batch_to_hits(batch)?);
        }
        hits.sort_by(|a, b| b.cosine.total_cmp(&a.cosine).then(a.key.cmp(&b.key)));
        hits.truncate(top_n);
        Ok(hits)
    }

    async fn release(&self, location: &str) -> Result<(), RepositoryError> {
        match self.db.drop_table(location, &[]).await {
            Ok(()) | Err(lancedb::Error::TableNotFound { .. }) => Ok(()),
            Err(e) => Err(RepositoryError::Query(format!("failed to drop index: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(document_id: i64, sentence: Option<u32>, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            key: CandidateKey {
                document_id,
                sentence,
            },
            vector,
        }
    }

    fn entries() -> Vec<VectorEntry> {
        vec![
            entry(1, None, vec![1.0, 0.0, 0.0]),
            entry(2, None, vec![0.0, 1.0, 0.0]),
            entry(2, Some(0), vec![0.7, 0.7, 0.0]),
        ]
    }

    #[tokio::test]
    async fn test_build_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let index = LanceVectorIndex::new(dir.path().join("vectors")).await.unwrap();

        let table = index.build("retrieval_a", 3, &entries()).await.unwrap();
        let hits = index.nearest(&table, &[1.0, 0.0, 0.0], 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, CandidateKey::document(1));
        assert!((hits[0].cosine - 1.0).abs() < 1e-4);
        assert_eq!(hits[1].key, CandidateKey::sentence(2, 0));
        assert!(hits[1].cosine > 0.6 && hits[1].cosine < 0.8);
    }

    #[tokio::test]
    async fn test_open_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors");
        {
            let index = LanceVectorIndex::new(path.clone()).await.unwrap();
            index.build("retrieval_b", 3, &entries()).await.unwrap();
        }

        let index = LanceVectorIndex::new(path).await.unwrap();
        let table = index.open("retrieval_b").await.unwrap();
        let hits = index.nearest(&table, &[0.0, 1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].key, CandidateKey::document(2));
        assert!(matches!(
            index.open("missing").await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let index = LanceVectorIndex::new(dir.path().join("vectors")).await.unwrap();
        index.build("retrieval_c", 3, &entries()).await.unwrap();
        assert_eq!(index.table_names().await.unwrap(), vec!["retrieval_c".to_string()]);

        index.release("retrieval_c").await.unwrap();
        index.release("retrieval_c").await.unwrap();
        assert!(index.table_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let index = LanceVectorIndex::new(dir.path().join("vectors")).await.unwrap();
        let result = index
            .build("retrieval_d", 4, &[entry(1, None, vec![1.0, 0.0])])
            .await;
        assert!(matches!(result, Err(RepositoryError::Query(_))));
        assert!(index.table_names().await.unwrap().is_empty());
    }
}
