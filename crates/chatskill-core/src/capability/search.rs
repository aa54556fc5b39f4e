//! Lexical search engine trait.

use chatskill_types::error::RepositoryError;
use chatskill_types::retrieval::{IndexEntry, LexicalHit};

/// Named full-text indices with BM25-style ranking.
///
/// Dataset ingestion creates one index per dataset; SLU term indices use the
/// same engine.
pub trait SearchEngine: Send + Sync {
    /// Register an empty index. Fails `Conflict` if the name is taken.
    fn create_index(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append entries to an existing index.
    fn index_entries(
        &self,
        name: &str,
        entries: &[IndexEntry],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Best `top_n` matches for `text` across `indices`, by descending raw
    /// score. Unknown index names contribute nothing.
    fn lexical_query(
        &self,
        indices: &[String],
        text: &str,
        top_n: usize,
    ) -> impl std::future::Future<Output = Result<Vec<LexicalHit>, RepositoryError>> + Send;

    fn index_exists(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Drop an index and its entries. Missing indices are not an error.
    fn delete_index(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
