//! Model archive trait used by export/import.

use std::path::Path;

use chatskill_types::error::RepositoryError;
use chatskill_types::model::ModelManifest;

/// Packs a manifest plus artifact files into a single file, and back.
pub trait ModelArchiver: Send + Sync {
    fn pack(
        &self,
        manifest: &ModelManifest,
        artifact_dir: &Path,
        dest: &Path,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Restore artifact files into `dest_dir` and return the manifest.
    fn unpack(
        &self,
        archive: &Path,
        dest_dir: &Path,
    ) -> impl std::future::Future<Output = Result<ModelManifest, RepositoryError>> + Send;
}
