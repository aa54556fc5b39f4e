//! Vector index trait for deployed retrieval skills.

use chatskill_types::error::RepositoryError;
use chatskill_types::retrieval::{NearestHit, VectorEntry};

/// Builds immutable nearest-neighbour indices at named locations.
///
/// Every deploy builds at a fresh location, so an index is never written
/// while it is being searched.
pub trait VectorIndex: Send + Sync {
    /// Open index shared read-only by concurrent queries.
    type Handle: Send + Sync + 'static;

    fn build(
        &self,
        location: &str,
        dimension: usize,
        entries: &[VectorEntry],
    ) -> impl std::future::Future<Output = Result<Self::Handle, RepositoryError>> + Send;

    /// Reopen a previously built index (e.g., after a restart).
    fn open(
        &self,
        location: &str,
    ) -> impl std::future::Future<Output = Result<Self::Handle, RepositoryError>> + Send;

    /// Best `top_n` entries by cosine similarity, descending.
    fn nearest(
        &self,
        handle: &Self::Handle,
        query: &[f32],
        top_n: usize,
    ) -> impl std::future::Future<Output = Result<Vec<NearestHit>, RepositoryError>> + Send;

    /// Delete the index at `location`. Missing locations are not an error.
    fn release(
        &self,
        location: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
