//! Local SLU engine.
//!
//! Intents are classified by cosine similarity to per-intent centroids of
//! encoder embeddings. Slots are tagged from a gazetteer of the slot values
//! seen in training.

pub mod centroid;
pub mod gazetteer;

pub use centroid::{CentroidLoader, CentroidModel, CentroidTrainer};

/// File written into every artifact directory.
pub const MODEL_FILE: &str = "model.json";
