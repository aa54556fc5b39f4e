//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (chatskill-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod dataset;
pub mod model;
pub mod retrieval;
pub mod slu;
pub mod tenant;
