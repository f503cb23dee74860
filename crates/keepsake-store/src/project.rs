//! Project accessor - experiments by id, listing, best checkpoint, lifecycle actions.
//!
//! `Project` composes a `Repository` (reads) with a `DaemonCache` (writes).
//! It is cheap to clone and safe to share across request handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use keepsake_common::{CheckpointRecord, ExperimentRecord, Goal, KeepsakeError, PrimaryMetric, Result};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::daemon::{Daemon, DaemonLauncher, LocalLauncher};
use crate::daemon_cache::{DaemonCache, DEFAULT_DAEMON_TIMEOUT};
use crate::repository::Repository;

/// Heartbeats older than this mean the experiment is no longer running.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct ProjectOptions {
    pub daemon_timeout: Duration,
    pub heartbeat_timeout: Duration,
    pub debug: bool,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            daemon_timeout: DEFAULT_DAEMON_TIMEOUT,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            debug: false,
        }
    }
}

#[derive(Clone)]
pub struct Project {
    inner: Arc<ProjectInner>,
}

struct ProjectInner {
    repo: Arc<Repository>,
    daemons: DaemonCache,
    options: ProjectOptions,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("repository", &self.inner.repo.uri())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Project {
    /// Open a project over a repository URI, writing through local daemon sessions.
    pub fn open(uri: &str, options: ProjectOptions) -> Result<Self> {
        let repo = Arc::new(Repository::from_uri(uri)?);
        let launcher = Arc::new(LocalLauncher::new(repo.clone(), options.debug));
        Ok(Self::with_launcher(repo, launcher, options))
    }

    /// Open a project with a custom daemon launcher.
    pub fn with_launcher(
        repo: Arc<Repository>,
        launcher: Arc<dyn DaemonLauncher>,
        options: ProjectOptions,
    ) -> Self {
        let daemons = DaemonCache::new(launcher, options.daemon_timeout);
        Self { inner: Arc::new(ProjectInner { repo, daemons, options }) }
    }

    pub fn repository(&self) -> &Repository { &self.inner.repo }

    pub fn options(&self) -> &ProjectOptions { &self.inner.options }

    /// Current daemon session, launched or recycled on demand.
    pub async fn daemon(&self) -> Result<Arc<dyn Daemon>> {
        self.inner.daemons.get().await
    }

    pub fn experiments(&self) -> Experiments<'_> {
        Experiments { project: self }
    }

    /// Release the daemon session. Called once on server shutdown.
    pub async fn shutdown(&self) {
        self.inner.daemons.shutdown().await;
    }

    /// A heartbeat that cannot be read counts as not running.
    async fn is_running(&self, experiment_id: &str) -> bool {
        let hb = match self.inner.repo.read_heartbeat(experiment_id).await {
            Ok(Some(hb)) => hb,
            Ok(None) => return false,
            Err(e) => {
                warn!(experiment_id, error = %e, "Skipping unreadable heartbeat");
                return false;
            }
        };
        let age = Utc::now().signed_duration_since(hb.last_heartbeat);
        age.to_std().map_or(true, |age| age <= self.inner.options.heartbeat_timeout)
    }

    async fn view(&self, record: ExperimentRecord) -> Experiment {
        let running = self.is_running(&record.id).await;
        Experiment { record, running, project: self.clone() }
    }

    /// Write metadata and heartbeat on one session. A session closed under
    /// us is dropped from the cache and the pair is retried once.
    async fn put_with_heartbeat(&self, record: &ExperimentRecord) -> Result<()> {
        let daemon = self.daemon().await?;
        match put_and_beat(daemon.as_ref(), record).await {
            Err(KeepsakeError::Daemon(reason)) => {
                warn!(experiment_id = %record.id, %reason, "Daemon session lost mid-write, retrying");
                self.inner.daemons.invalidate(daemon.session_id()).await;
                put_and_beat(self.daemon().await?.as_ref(), record).await
            }
            other => other,
        }
    }
}

async fn put_and_beat(daemon: &dyn Daemon, record: &ExperimentRecord) -> Result<()> {
    daemon.put_experiment(record).await?;
    daemon.heartbeat(&record.id).await
}

/// Parameters for a new experiment.
#[derive(Debug, Clone, Default)]
pub struct ExperimentSpec {
    pub path: Option<String>,
    pub command: String,
    pub params: HashMap<String, Value>,
    pub user: Option<String>,
    pub host: Option<String>,
}

/// Parameters for a new checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CheckpointSpec {
    pub path: Option<String>,
    pub metrics: HashMap<String, Value>,
    pub step: Option<i64>,
    pub primary_metric: Option<PrimaryMetric>,
}

/// Experiment collection of a project.
pub struct Experiments<'a> {
    project: &'a Project,
}

impl Experiments<'_> {
    /// All experiments, in no particular order.
    pub async fn list(&self) -> Result<Vec<Experiment>> {
        let records = self.project.inner.repo.read_all_experiments().await?;
        let mut experiments = Vec::with_capacity(records.len());
        for record in records {
            experiments.push(self.project.view(record).await);
        }
        Ok(experiments)
    }

    /// Look up by full id, or by a prefix that matches exactly one experiment.
    pub async fn get(&self, id: &str) -> Result<Experiment> {
        let id = id.trim();
        if id.is_empty() {
            return Err(KeepsakeError::ExperimentNotFound(id.to_string()));
        }

        let ids = self.project.inner.repo.experiment_ids().await?;
        let full_id = if ids.iter().any(|candidate| candidate == id) {
            id.to_string()
        } else {
            let matches: Vec<&String> = ids.iter().filter(|c| c.starts_with(id)).collect();
            match matches.as_slice() {
                [] => return Err(KeepsakeError::ExperimentNotFound(id.to_string())),
                [only] => (*only).clone(),
                _ => {
                    return Err(KeepsakeError::AmbiguousId {
                        prefix: id.to_string(),
                        count: matches.len(),
                    })
                }
            }
        };

        let record = self.project.inner.repo.read_experiment(&full_id).await?;
        Ok(self.project.view(record).await)
    }

    /// Record a new running experiment.
    pub async fn create(&self, spec: ExperimentSpec) -> Result<Experiment> {
        let record = ExperimentRecord {
            id: new_id(),
            created: Utc::now(),
            user: spec.user.unwrap_or_else(|| std::env::var("USER").unwrap_or_default()),
            host: spec.host.unwrap_or_else(|| std::env::var("HOSTNAME").unwrap_or_default()),
            command: spec.command,
            path: spec.path,
            params: spec.params,
            config: None,
            checkpoints: Vec::new(),
            keepsake_version: None,
        };

        self.project.put_with_heartbeat(&record).await?;
        info!(experiment_id = %record.id, "Experiment created");

        Ok(Experiment { record, running: true, project: self.project.clone() })
    }
}

/// 64 hex characters, matching the id width of existing repositories.
fn new_id() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Read-only view of an experiment with lifecycle actions.
#[derive(Debug, Clone)]
pub struct Experiment {
    record: ExperimentRecord,
    running: bool,
    project: Project,
}

impl Experiment {
    pub fn id(&self) -> &str { &self.record.id }

    pub fn short_id(&self) -> &str { self.record.short_id() }

    pub fn created(&self) -> DateTime<Utc> { self.record.created }

    pub fn user(&self) -> &str { &self.record.user }

    pub fn host(&self) -> &str { &self.record.host }

    pub fn command(&self) -> &str { &self.record.command }

    pub fn params(&self) -> &HashMap<String, Value> { &self.record.params }

    pub fn checkpoints(&self) -> &[CheckpointRecord] { &self.record.checkpoints }

    pub fn record(&self) -> &ExperimentRecord { &self.record }

    pub fn is_running(&self) -> bool { self.running }

    pub fn latest(&self) -> Option<&CheckpointRecord> {
        self.record.checkpoints.iter().max_by_key(|c| c.created)
    }

    /// Primary metric declared by the most recent checkpoint that has one.
    pub fn primary_metric(&self) -> Option<&PrimaryMetric> {
        self.record.checkpoints.iter().rev().find_map(|c| c.primary_metric.as_ref())
    }

    /// Checkpoint with the best primary metric value. Earliest wins ties.
    pub fn best(&self) -> Option<&CheckpointRecord> {
        let mut best: Option<(&CheckpointRecord, f64)> = None;
        for chk in &self.record.checkpoints {
            let (Some(pm), Some(value)) = (chk.primary_metric.as_ref(), chk.primary_metric_value())
            else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, current)) => match pm.goal {
                    Goal::Maximize => value > current,
                    Goal::Minimize => value < current,
                },
            };
            if better {
                best = Some((chk, value));
            }
        }
        best.map(|(chk, _)| chk)
    }

    /// Running → time since creation; otherwise creation to last checkpoint.
    pub fn duration(&self) -> chrono::Duration {
        let end = if self.running {
            Utc::now()
        } else {
            match self.latest() {
                Some(chk) => chk.created,
                None => return chrono::Duration::zero(),
            }
        };
        end.signed_duration_since(self.record.created).max(chrono::Duration::zero())
    }

    /// Append a checkpoint and refresh the heartbeat.
    pub async fn checkpoint(&mut self, spec: CheckpointSpec) -> Result<CheckpointRecord> {
        let chk = CheckpointRecord {
            id: new_id(),
            created: Utc::now(),
            metrics: spec.metrics,
            step: spec.step,
            path: spec.path,
            primary_metric: spec.primary_metric,
        };
        let mut record = self.record.clone();
        record.checkpoints.push(chk.clone());

        self.project.put_with_heartbeat(&record).await?;

        self.record = record;
        self.running = true;
        Ok(chk)
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.project.daemon().await?.stop_experiment(&self.record.id).await?;
        self.running = false;
        info!(experiment_id = %self.record.id, "Experiment stopped");
        Ok(())
    }

    pub async fn delete(self) -> Result<()> {
        self.project.daemon().await?.delete_experiment(&self.record).await?;
        info!(experiment_id = %self.record.id, "Experiment deleted");
        Ok(())
    }
}
