//! Shared domain types for chatskill.
//!
//! Tenants, skills (retrieval, SLU, model), datasets, configuration, and the
//! error types that cross crate boundaries.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod dataset;
pub mod error;
pub mod id;
pub mod model;
pub mod retrieval;
pub mod skill;
pub mod slu;
pub mod tenant;
