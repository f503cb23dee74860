//! Repository access layer - reads and writes keepsake metadata on the local filesystem.
//!
//! Reads are open to any caller. Writes are crate-private and only reachable
//! through a daemon session (see `daemon.rs`).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use keepsake_common::{ExperimentRecord, Heartbeat, KeepsakeError, Result};
use tracing::{debug, warn};

const FILE_SCHEME: &str = "file://";

/// A keepsake repository rooted at a local directory.
#[derive(Debug, Clone)]
pub struct Repository {
    uri: String,
    root: PathBuf,
}

impl Repository {
    /// Parse a repository URI. Accepts `file://<path>` or a bare path.
    ///
    /// Does not touch the filesystem; a repository that does not exist yet
    /// simply has no experiments.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        let path = match uri.strip_prefix(FILE_SCHEME) {
            Some(rest) => rest,
            None if uri.contains("://") => {
                return Err(KeepsakeError::UnsupportedRepository(uri.to_string()))
            }
            None => uri,
        };
        if path.is_empty() {
            return Err(KeepsakeError::UnsupportedRepository(uri.to_string()));
        }
        Ok(Self { uri: uri.to_string(), root: PathBuf::from(path) })
    }

    pub fn uri(&self) -> &str { &self.uri }

    pub fn root(&self) -> &Path { &self.root }

    fn experiments_dir(&self) -> PathBuf {
        self.root.join("metadata").join("experiments")
    }

    fn heartbeats_dir(&self) -> PathBuf {
        self.root.join("metadata").join("heartbeats")
    }

    fn experiment_path(&self, id: &str) -> PathBuf {
        self.experiments_dir().join(format!("{id}.json"))
    }

    fn heartbeat_path(&self, id: &str) -> PathBuf {
        self.heartbeats_dir().join(format!("{id}.json"))
    }

    fn experiment_archive_path(&self, id: &str) -> PathBuf {
        self.root.join("experiments").join(format!("{id}.tar.gz"))
    }

    fn checkpoint_archive_path(&self, id: &str) -> PathBuf {
        self.root.join("checkpoints").join(format!("{id}.tar.gz"))
    }

    /// Ids of every experiment with a metadata file. Missing directory → empty.
    pub async fn experiment_ids(&self) -> Result<Vec<String>> {
        let dir = self.experiments_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "No experiment metadata directory yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Read one experiment's metadata by its full id.
    pub async fn read_experiment(&self, id: &str) -> Result<ExperimentRecord> {
        let path = self.experiment_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(KeepsakeError::ExperimentNotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read every experiment. Unreadable metadata files are skipped with a warning.
    pub async fn read_all_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        let mut records = Vec::new();
        for id in self.experiment_ids().await? {
            match self.read_experiment(&id).await {
                Ok(rec) => records.push(rec),
                Err(e) => warn!(experiment_id = %id, error = %e, "Skipping unreadable experiment metadata"),
            }
        }
        Ok(records)
    }

    pub async fn read_heartbeat(&self, id: &str) -> Result<Option<Heartbeat>> {
        match tokio::fs::read(self.heartbeat_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn write_experiment(&self, record: &ExperimentRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.experiment_path(&record.id), &bytes).await
    }

    pub(crate) async fn write_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        let bytes = serde_json::to_vec(heartbeat)?;
        write_atomic(&self.heartbeat_path(&heartbeat.experiment_id), &bytes).await
    }

    pub(crate) async fn remove_heartbeat(&self, id: &str) -> Result<()> {
        remove_if_exists(&self.heartbeat_path(id)).await
    }

    /// Remove metadata, heartbeat and any stored archives for an experiment.
    pub(crate) async fn remove_experiment(&self, record: &ExperimentRecord) -> Result<()> {
        for chk in &record.checkpoints {
            remove_if_exists(&self.checkpoint_archive_path(&chk.id)).await?;
        }
        remove_if_exists(&self.experiment_archive_path(&record.id)).await?;
        remove_if_exists(&self.heartbeat_path(&record.id)).await?;
        remove_if_exists(&self.experiment_path(&record.id)).await
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn record(id: &str) -> ExperimentRecord {
        ExperimentRecord {
            id: id.to_string(),
            created: Utc::now(),
            user: "ada".into(),
            host: "lab".into(),
            command: "train.py".into(),
            path: Some(".".into()),
            params: HashMap::new(),
            config: None,
            checkpoints: Vec::new(),
            keepsake_version: None,
        }
    }

    #[test]
    fn test_from_uri_accepts_file_scheme_and_bare_paths() {
        let repo = Repository::from_uri("file:///tmp/keepsake").unwrap();
        assert_eq!(repo.root(), Path::new("/tmp/keepsake"));
        assert_eq!(repo.uri(), "file:///tmp/keepsake");

        let repo = Repository::from_uri("relative/repo").unwrap();
        assert_eq!(repo.root(), Path::new("relative/repo"));
    }

    #[test]
    fn test_from_uri_rejects_remote_schemes() {
        let err = Repository::from_uri("s3://bucket/path").unwrap_err();
        assert!(matches!(err, KeepsakeError::UnsupportedRepository(_)));
        assert!(Repository::from_uri("file://").is_err());
        assert!(Repository::from_uri("").is_err());
    }

    #[tokio::test]
    async fn test_missing_repository_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::from_uri(dir.path().join("nope").to_str().unwrap()).unwrap();
        assert!(repo.experiment_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_then_remove_experiment() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::from_uri(dir.path().to_str().unwrap()).unwrap();
        let rec = record("abc123");

        repo.write_experiment(&rec).await.unwrap();
        repo.write_heartbeat(&Heartbeat { experiment_id: rec.id.clone(), last_heartbeat: Utc::now() })
            .await
            .unwrap();
        assert_eq!(repo.experiment_ids().await.unwrap(), vec!["abc123".to_string()]);
        assert_eq!(repo.read_experiment("abc123").await.unwrap(), rec);
        assert!(repo.read_heartbeat("abc123").await.unwrap().is_some());

        repo.remove_experiment(&rec).await.unwrap();
        assert!(repo.experiment_ids().await.unwrap().is_empty());
        assert!(repo.read_heartbeat("abc123").await.unwrap().is_none());
        assert!(repo.read_experiment("abc123").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unreadable_metadata_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::from_uri(dir.path().to_str().unwrap()).unwrap();
        repo.write_experiment(&record("good")).await.unwrap();
        tokio::fs::write(repo.experiment_path("broken"), b"{not json").await.unwrap();

        let all = repo.read_all_experiments().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "good");
    }
}
