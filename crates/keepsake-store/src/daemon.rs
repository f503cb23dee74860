//! Daemon sessions - the only path through which the repository is mutated.
//!
//! A daemon is a background session bound to one project. The project hands
//! out a cached session (see `daemon_cache.rs`) and recycles it once it gets
//! too old; `cleanup()` is called on the old session before it is dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use keepsake_common::{ExperimentRecord, Heartbeat, KeepsakeError, Result};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::repository::Repository;

/// Write-side session against a repository.
#[async_trait]
pub trait Daemon: Send + Sync + fmt::Debug {
    /// Identity of this session; stable for the life of the handle.
    fn session_id(&self) -> Uuid;

    /// Create or overwrite an experiment's metadata.
    async fn put_experiment(&self, record: &ExperimentRecord) -> Result<()>;

    /// Mark an experiment as alive now.
    async fn heartbeat(&self, experiment_id: &str) -> Result<()>;

    /// Mark an experiment as stopped.
    async fn stop_experiment(&self, experiment_id: &str) -> Result<()>;

    /// Remove an experiment and everything stored for it.
    async fn delete_experiment(&self, record: &ExperimentRecord) -> Result<()>;

    /// Release the session. Called exactly once, before the handle is dropped by the cache.
    async fn cleanup(&self) -> Result<()>;
}

/// Builds new daemon sessions for a project.
#[async_trait]
pub trait DaemonLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Daemon>>;
}

/// Launches `LocalDaemon` sessions over a filesystem repository.
#[derive(Debug, Clone)]
pub struct LocalLauncher {
    repo: Arc<Repository>,
    debug: bool,
}

impl LocalLauncher {
    pub fn new(repo: Arc<Repository>, debug: bool) -> Self {
        Self { repo, debug }
    }
}

#[async_trait]
impl DaemonLauncher for LocalLauncher {
    async fn launch(&self) -> Result<Arc<dyn Daemon>> {
        let daemon = LocalDaemon::start(self.repo.clone(), self.debug).await?;
        Ok(Arc::new(daemon))
    }
}

/// Daemon that applies writes directly to a local repository.
///
/// Writes hold a shared lock; `cleanup()` takes the exclusive lock so it
/// waits for in-flight writes before closing the session.
pub struct LocalDaemon {
    session_id: Uuid,
    repo: Arc<Repository>,
    debug: bool,
    gate: RwLock<()>,
    closed: AtomicBool,
    writes: AtomicU64,
}

impl fmt::Debug for LocalDaemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalDaemon")
            .field("session_id", &self.session_id)
            .field("root", &self.repo.root())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl LocalDaemon {
    pub async fn start(repo: Arc<Repository>, debug: bool) -> Result<Self> {
        tokio::fs::create_dir_all(repo.root().join("metadata")).await?;
        let session_id = Uuid::new_v4();
        info!(%session_id, repository = %repo.uri(), "Daemon session started");
        Ok(Self {
            session_id,
            repo,
            debug,
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of writes applied through this session.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(KeepsakeError::Daemon(format!("session {} is closed", self.session_id)));
        }
        Ok(())
    }

    fn record_write(&self, op: &str, target: &str) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.debug {
            debug!(session_id = %self.session_id, op, target, "Daemon write");
        }
    }
}

#[async_trait]
impl Daemon for LocalDaemon {
    fn session_id(&self) -> Uuid { self.session_id }

    async fn put_experiment(&self, record: &ExperimentRecord) -> Result<()> {
        let _guard = self.gate.read().await;
        self.ensure_open()?;
        self.repo.write_experiment(record).await?;
        self.record_write("put_experiment", &record.id);
        Ok(())
    }

    async fn heartbeat(&self, experiment_id: &str) -> Result<()> {
        let _guard = self.gate.read().await;
        self.ensure_open()?;
        let hb = Heartbeat { experiment_id: experiment_id.to_string(), last_heartbeat: Utc::now() };
        self.repo.write_heartbeat(&hb).await?;
        self.record_write("heartbeat", experiment_id);
        Ok(())
    }

    async fn stop_experiment(&self, experiment_id: &str) -> Result<()> {
        let _guard = self.gate.read().await;
        self.ensure_open()?;
        self.repo.remove_heartbeat(experiment_id).await?;
        self.record_write("stop_experiment", experiment_id);
        Ok(())
    }

    async fn delete_experiment(&self, record: &ExperimentRecord) -> Result<()> {
        let _guard = self.gate.read().await;
        self.ensure_open()?;
        self.repo.remove_experiment(record).await?;
        self.record_write("delete_experiment", &record.id);
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        let _guard = self.gate.write().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!(session_id = %self.session_id, writes = self.write_count(), "Daemon session cleaned up");
        Ok(())
    }
}
