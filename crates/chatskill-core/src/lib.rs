//! Skill orchestration and port definitions for chatskill.
//!
//! This crate defines the "ports" (repository and capability traits) that the
//! infrastructure layer implements, plus everything that runs on top of them:
//! the tenant registry, the per-type skill managers, the hybrid retrieval
//! scorer, model lifecycle, and SLU inference. It depends only on
//! `chatskill-types` -- never on `chatskill-infra` or any database/IO crate.

pub mod capability;
pub mod model;
pub mod platform;
pub mod repository;
pub mod retrieval;
pub mod skill;
pub mod slu;
pub mod tenant;

#[cfg(test)]
pub(crate) mod testing;
