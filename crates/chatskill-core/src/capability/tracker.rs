//! Experiment tracker trait.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chatskill_types::error::RepositoryError;
use chatskill_types::model::RunRecord;

/// Records training runs: parameters, metrics, tags, and artifacts.
///
/// Runs are grouped by namespace; each tenant uses `chatbot-{tenant_id}`.
pub trait ExperimentTracker: Send + Sync {
    /// Where runs are stored, for display.
    fn tracking_uri(&self) -> String;

    /// Start a run and return its id.
    fn create_run(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    fn log_params(
        &self,
        run_id: &str,
        params: &BTreeMap<String, String>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn log_metrics(
        &self,
        run_id: &str,
        metrics: &BTreeMap<String, f64>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn set_tags(
        &self,
        run_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Copy a local artifact directory into the run. Returns the artifact URI.
    fn log_artifacts(
        &self,
        run_id: &str,
        local_dir: &Path,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Local path of the run's artifact directory.
    fn get_artifact(
        &self,
        run_id: &str,
    ) -> impl std::future::Future<Output = Result<PathBuf, RepositoryError>> + Send;

    fn get_run(
        &self,
        run_id: &str,
    ) -> impl std::future::Future<Output = Result<RunRecord, RepositoryError>> + Send;

    fn list_tags(
        &self,
        run_id: &str,
    ) -> impl std::future::Future<Output = Result<BTreeMap<String, String>, RepositoryError>> + Send;

    fn delete_run(
        &self,
        run_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
