//! Infrastructure layer for chatskill.
//!
//! Contains implementations of the ports defined in `chatskill-core`: SQLite
//! repositories and FTS5 lexical search, LanceDB vector indices, fastembed
//! text encoding, a filesystem experiment tracker, gzip model archives, and
//! the local centroid SLU engine.

pub mod archive;
pub mod config;
pub mod platform;
pub mod segment;
pub mod slu;
pub mod sqlite;
pub mod tracking;
pub mod vector;
