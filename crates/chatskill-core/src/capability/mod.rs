//! Capability traits (ports) for the external engines skills run on.
//!
//! Text encoding, lexical search, vector search, training, experiment
//! tracking, model loading, and model archives. Implementations live in
//! chatskill-infra; in-memory fakes back the core tests.

pub mod archive;
pub mod encoder;
pub mod search;
pub mod slu_model;
pub mod tracker;
pub mod trainer;
pub mod vector;
