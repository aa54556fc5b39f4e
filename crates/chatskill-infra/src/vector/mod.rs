//! Vector search infrastructure.
//!
//! LanceDB tables hold the embeddings of deployed retrieval skills, one
//! table per deploy location. fastembed provides local text encoding.

pub mod embedder;
pub mod lance;
pub mod schema;
