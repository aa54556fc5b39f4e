//! Filesystem experiment tracker.
//!
//! Layout under the tracking root:
//!
//! ```text
//! {root}/{run_id}/run.json     params, metrics, tags, namespace
//! {root}/{run_id}/artifacts/   copied artifact files
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chatskill_core::capability::tracker::ExperimentTracker;
use chatskill_types::error::RepositoryError;
use chatskill_types::model::RunRecord;
use tokio::sync::Mutex;
use uuid::Uuid;

const RUN_FILE: &str = "run.json";
const ARTIFACT_DIR: &str = "artifacts";

pub struct FileTracker {
    root: PathBuf,
    // Serializes read-modify-write of run files.
    write_lock: Mutex<()>,
}

fn io_err(context: &str, path: &Path, e: std::io::Error) -> RepositoryError {
    RepositoryError::Query(format!("{context} {}: {e}", path.display()))
}

/// Recursively copy `from` into `to`.
pub(crate) fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

impl FileTracker {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf, RepositoryError> {
        // Run ids are generated here; anything else cannot name a run.
        if run_id.is_empty() || !run_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RepositoryError::NotFound);
        }
        Ok(self.root.join(run_id))
    }

    async fn read_run(&self, run_id: &str) -> Result<RunRecord, RepositoryError> {
        let path = self.run_dir(run_id)?.join(RUN_FILE);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepositoryError::NotFound);
            }
            Err(e) => return Err(io_err("failed to read", &path, e)),
        };
        serde_json::from_str(&json)
            .map_err(|e| RepositoryError::Query(format!("invalid run file {}: {e}", path.display())))
    }

    async fn write_run(&self, run: &RunRecord) -> Result<(), RepositoryError> {
        let dir = self.run_dir(&run.run_id)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_err("failed to create", &dir, e))?;
        let json = serde_json::to_string_pretty(run)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let path = dir.join(RUN_FILE);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| io_err("failed to write", &path, e))
    }

    async fn update_run(
        &self,
        run_id: &str,
        apply: impl FnOnce(&mut RunRecord),
    ) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut run = self.read_run(run_id).await?;
        apply(&mut run);
        self.write_run(&run).await
    }
}

impl ExperimentTracker for FileTracker {
    fn tracking_uri(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn create_run(&self, namespace: &str, name: &str) -> Result<String, RepositoryError> {
        let run = RunRecord {
            run_id: Uuid::now_v7().simple().to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            ..RunRecord::default()
        };
        let _guard = self.write_lock.lock().await;
        self.write_run(&run).await?;
        tracing::debug!(run_id = %run.run_id, namespace = %namespace, "created run");
        Ok(run.run_id)
    }

    async fn log_params(
        &self,
        run_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), RepositoryError> {
        self.update_run(run_id, |run| run.params.extend(params.clone()))
            .await
    }

    async fn log_metrics(
        &self,
        run_id: &str,
        metrics: &BTreeMap<String, f64>,
    ) -> Result<(), RepositoryError> {
        self.update_run(run_id, |run| run.metrics.extend(metrics.clone()))
            .await
    }

    async fn set_tags(
        &self,
        run_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), RepositoryError> {
        self.update_run(run_id, |run| run.tags.extend(tags.clone()))
            .await
    }

    async fn log_artifacts(&self, run_id: &str, local_dir: &Path) -> Result<String, RepositoryError> {
        self.read_run(run_id).await?;
        let dest = self.run_dir(run_id)?.join(ARTIFACT_DIR);
        let from = local_dir.to_path_buf();
        let to = dest.clone();
        tokio::task::spawn_blocking(move || copy_dir(&from, &to))
            .await
            .map_err(|e| RepositoryError::Query(format!("artifact copy task failed: {e}")))?
            .map_err(|e| io_err("failed to copy artifacts from", local_dir, e))?;
        Ok(format!("file://{}", dest.display()))
    }

    async fn get_artifact(&self, run_id: &str) -> Result<PathBuf, RepositoryError> {
        self.read_run(run_id).await?;
        Ok(self.run_dir(run_id)?.join(ARTIFACT_DIR))
    }

    async fn get_run(&self, run_id: &str) -> Result<RunRecord, RepositoryError> {
        self.read_run(run_id).await
    }

    async fn list_tags(&self, run_id: &str) -> Result<BTreeMap<String, String>, RepositoryError> {
        Ok(self.read_run(run_id).await?.tags)
    }

    async fn delete_run(&self, run_id: &str) -> Result<(), RepositoryError> {
        let dir = self.run_dir(run_id)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RepositoryError::NotFound),
            Err(e) => Err(io_err("failed to delete", &dir, e)),
        }
    }
}
