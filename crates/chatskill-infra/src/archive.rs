//! Gzip-compressed JSON model archives.
//!
//! An archive is one gzip stream holding a JSON document: the manifest plus
//! every artifact file, base64-encoded and keyed by its relative path.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chatskill_core::capability::archive::ModelArchiver;
use chatskill_types::error::RepositoryError;
use chatskill_types::model::ModelManifest;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct ArchiveDocument {
    manifest: ModelManifest,
    files: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GzipArchiver;

fn archive_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

/// Collect every file under `root` keyed by its `/`-separated relative path.
fn collect_files(
    root: &Path,
    dir: &Path,
    files: &mut BTreeMap<String, String>,
) -> Result<(), RepositoryError> {
    for entry in std::fs::read_dir(dir).map_err(archive_err)? {
        let entry = entry.map_err(archive_err)?;
        let path = entry.path();
        if entry.file_type().map_err(archive_err)?.is_dir() {
            collect_files(root, &path, files)?;
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(archive_err)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = std::fs::read(&path).map_err(archive_err)?;
        files.insert(relative, STANDARD.encode(bytes));
    }
    Ok(())
}

/// Resolve an archived path below `dest_dir`, rejecting anything that would
/// escape it.
fn safe_join(dest_dir: &Path, relative: &str) -> Result<PathBuf, RepositoryError> {
    let path = Path::new(relative);
    if relative.is_empty()
        || !path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(RepositoryError::Query(format!(
            "archive entry has an unsafe path: {relative}"
        )));
    }
    Ok(dest_dir.join(path))
}

fn pack_blocking(
    manifest: &ModelManifest,
    artifact_dir: &Path,
    dest: &Path,
) -> Result<(), RepositoryError> {
    let mut files = BTreeMap::new();
    collect_files(artifact_dir, artifact_dir, &mut files)?;
    let document = ArchiveDocument {
        manifest: manifest.clone(),
        files,
    };
    let json = serde_json::to_vec(&document).map_err(archive_err)?;

    let file = std::fs::File::create(dest).map_err(archive_err)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&json).map_err(archive_err)?;
    encoder.finish().map_err(archive_err)?;
    Ok(())
}

fn unpack_blocking(archive: &Path, dest_dir: &Path) -> Result<ModelManifest, RepositoryError> {
    let file = std::fs::File::open(archive).map_err(archive_err)?;
    let mut json = Vec::new();
    GzDecoder::new(file)
        .read_to_end(&mut json)
        .map_err(archive_err)?;
    let document: ArchiveDocument = serde_json::from_slice(&json).map_err(archive_err)?;

    std::fs::create_dir_all(dest_dir).map_err(archive_err)?;
    for (relative, encoded) in &document.files {
        let path = safe_join(dest_dir, relative)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(archive_err)?;
        }
        let bytes = STANDARD.decode(encoded).map_err(archive_err)?;
        std::fs::write(&path, bytes).map_err(archive_err)?;
    }
    Ok(document.manifest)
}

impl ModelArchiver for GzipArchiver {
    async fn pack(
        &self,
        manifest: &ModelManifest,
        artifact_dir: &Path,
        dest: &Path,
    ) -> Result<(), RepositoryError> {
        let manifest = manifest.clone();
        let artifact_dir = artifact_dir.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || pack_blocking(&manifest, &artifact_dir, &dest))
            .await
            .map_err(archive_err)?
    }

    async fn unpack(&self, archive: &Path, dest_dir: &Path) -> Result<ModelManifest, RepositoryError> {
        let archive = archive.to_path_buf();
        let dest_dir = dest_dir.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_blocking(&archive, &dest_dir))
            .await
            .map_err(archive_err)?
    }
}

#[cfg(test)]
mod tests {
    use chatskill_types::model::{TrainRequest, TrainingExample};
    use chatskill_types::skill::{SkillId, SkillType, SluTask};

    use super::*;

    fn manifest() -> ModelManifest {
        ModelManifest {
            model_id: SkillId::new(),
            task: SluTask::Intent,
            params: BTreeMap::from([("epoch".to_string(), "2".to_string())]),
            metrics: BTreeMap::from([("accuracy".to_string(), 0.5)]),
            tags: BTreeMap::from([("task".to_string(), "SLU-intent".to_string())]),
            original_request: TrainRequest {
                task: SluTask::Intent,
                skill_type: SkillType::Slu,
                skill_id: SkillId::new(),
                train_data: vec![TrainingExample {
                    text: "hello".to_string(),
                    intent: Some("greet".to_string()),
                    slots: Vec::new(),
                }],
                eval_data: None,
                args: None,
            },
        }
    }

    #[tokio::test]
    async fn test_pack_and_unpack_restores_files() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("artifact");
        std::fs::create_dir_all(artifact.join("sub")).unwrap();
        std::fs::write(artifact.join("model.json"), b"{\"k\":1}").unwrap();
        std::fs::write(artifact.join("sub").join("weights.bin"), [0u8, 159, 255]).unwrap();

        let manifest = manifest();
        let dest = dir.path().join("model.json.gz");
        GzipArchiver.pack(&manifest, &artifact, &dest).await.unwrap();

        let out = dir.path().join("restored");
        let restored = GzipArchiver.unpack(&dest, &out).await.unwrap();
        assert_eq!(restored, manifest);
        assert_eq!(std::fs::read(out.join("model.json")).unwrap(), b"{\"k\":1}");
        assert_eq!(
            std::fs::read(out.join("sub").join("weights.bin")).unwrap(),
            vec![0u8, 159, 255]
        );
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.json.gz");
        std::fs::write(&bogus, b"not gzip").unwrap();
        assert!(
            GzipArchiver
                .unpack(&bogus, &dir.path().join("out"))
                .await
                .is_err()
        );
    }

    #[test]
    fn test_safe_join_rejects_escapes() {
        let dest = Path::new("/tmp/staging");
        assert!(safe_join(dest, "model.json").is_ok());
        assert!(safe_join(dest, "a/b.bin").is_ok());
        assert!(safe_join(dest, "../evil").is_err());
        assert!(safe_join(dest, "/etc/passwd").is_err());
        assert!(safe_join(dest, "").is_err());
    }
}
