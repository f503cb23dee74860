//! Temp-directory keepsake repositories seeded with fixture experiments.
//!
//! ```rust,no_run
//! use keepsake_test_utils::{ExperimentFixture, TestRepository};
//!
//! let repo = TestRepository::new();
//! repo.add(ExperimentFixture::new("1eeeeb5e5c2a").param("lr", 0.01));
//! let uri = repo.uri();
//! ```

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use keepsake_common::{CheckpointRecord, ExperimentRecord, Goal, Heartbeat, PrimaryMetric};
use serde_json::Value;
use tempfile::TempDir;

pub use pretty_assertions::assert_eq;

/// A repository living in a temp directory, deleted on drop.
pub struct TestRepository {
    dir: TempDir,
}

impl Default for TestRepository {
    fn default() -> Self { Self::new() }
}

impl TestRepository {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("create temp repository") }
    }

    pub fn path(&self) -> &Path { self.dir.path() }

    pub fn uri(&self) -> String {
        format!("file://{}", self.dir.path().display())
    }

    /// Write an experiment's metadata file.
    pub fn add(&self, fixture: ExperimentFixture) -> ExperimentRecord {
        let record = fixture.build();
        let dir = self.dir.path().join("metadata").join("experiments");
        std::fs::create_dir_all(&dir).expect("create metadata dir");
        let bytes = serde_json::to_vec_pretty(&record).expect("serialize experiment");
        std::fs::write(dir.join(format!("{}.json", record.id)), bytes).expect("write experiment");
        record
    }

    /// Write a heartbeat so the experiment reads as running.
    pub fn heartbeat(&self, experiment_id: &str, at: DateTime<Utc>) {
        let dir = self.dir.path().join("metadata").join("heartbeats");
        std::fs::create_dir_all(&dir).expect("create heartbeat dir");
        let hb = Heartbeat { experiment_id: experiment_id.to_string(), last_heartbeat: at };
        let bytes = serde_json::to_vec(&hb).expect("serialize heartbeat");
        std::fs::write(dir.join(format!("{experiment_id}.json")), bytes).expect("write heartbeat");
    }

    /// Write raw bytes as an experiment's heartbeat file.
    pub fn heartbeat_raw(&self, experiment_id: &str, contents: &str) {
        let dir = self.dir.path().join("metadata").join("heartbeats");
        std::fs::create_dir_all(&dir).expect("create heartbeat dir");
        std::fs::write(dir.join(format!("{experiment_id}.json")), contents).expect("write raw heartbeat");
    }

    /// Write raw bytes as an experiment metadata file.
    pub fn add_raw(&self, experiment_id: &str, contents: &str) {
        let dir = self.dir.path().join("metadata").join("experiments");
        std::fs::create_dir_all(&dir).expect("create metadata dir");
        std::fs::write(dir.join(format!("{experiment_id}.json")), contents).expect("write raw metadata");
    }
}

/// Fixed base time so fixture timestamps are reproducible.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).single().expect("valid base time")
}

pub struct ExperimentFixture {
    record: ExperimentRecord,
}

impl ExperimentFixture {
    pub fn new(id: &str) -> Self {
        Self {
            record: ExperimentRecord {
                id: id.to_string(),
                created: base_time(),
                user: "tester".to_string(),
                host: "localhost".to_string(),
                command: "python train.py".to_string(),
                path: Some(".".to_string()),
                params: HashMap::new(),
                config: None,
                checkpoints: Vec::new(),
                keepsake_version: Some("0.4.2".to_string()),
            },
        }
    }

    /// Created `minutes` after the base time.
    pub fn created_at(mut self, minutes: i64) -> Self {
        self.record.created = base_time() + Duration::minutes(minutes);
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.record.user = user.to_string();
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.record.command = command.to_string();
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.record.params.insert(key.to_string(), value.into());
        self
    }

    pub fn checkpoint(mut self, fixture: CheckpointFixture) -> Self {
        let mut chk = fixture.record;
        chk.created = self.record.created + Duration::minutes(fixture.offset_minutes);
        self.record.checkpoints.push(chk);
        self
    }

    pub fn build(self) -> ExperimentRecord { self.record }
}

pub struct CheckpointFixture {
    record: CheckpointRecord,
    offset_minutes: i64,
}

impl CheckpointFixture {
    pub fn new(id: &str, step: i64) -> Self {
        Self {
            record: CheckpointRecord {
                id: id.to_string(),
                created: base_time(),
                metrics: HashMap::new(),
                step: Some(step),
                path: Some("model.pth".to_string()),
                primary_metric: None,
            },
            offset_minutes: step,
        }
    }

    /// Created `minutes` after its experiment.
    pub fn after(mut self, minutes: i64) -> Self {
        self.offset_minutes = minutes;
        self
    }

    pub fn metric(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.record.metrics.insert(key.to_string(), value.into());
        self
    }

    pub fn primary(mut self, name: &str, goal: Goal) -> Self {
        self.record.primary_metric = Some(PrimaryMetric { name: name.to_string(), goal });
        self
    }
}
