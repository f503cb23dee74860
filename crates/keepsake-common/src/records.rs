//! Metadata records as stored in a keepsake repository.
//!
//! Layout under the repository root:
//!   metadata/experiments/<experiment_id>.json  → ExperimentRecord
//!   metadata/heartbeats/<experiment_id>.json   → Heartbeat
//!   experiments/<experiment_id>.tar.gz         → code snapshot (not read here)
//!   checkpoints/<checkpoint_id>.tar.gz         → checkpoint files (not read here)

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of leading id characters shown in the UI.
pub const SHORT_ID_LEN: usize = 7;

/// Abbreviate a full hex id for display.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Maximize,
    Minimize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryMetric {
    pub name: String,
    pub goal: Goal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub id: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub metrics: HashMap<String, Value>,
    #[serde(default)]
    pub step: Option<i64>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub primary_metric: Option<PrimaryMetric>,
}

impl CheckpointRecord {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Numeric value of the primary metric, if the checkpoint declares one and recorded it.
    pub fn primary_metric_value(&self) -> Option<f64> {
        let pm = self.primary_metric.as_ref()?;
        self.metrics.get(&pm.name)?.as_f64()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointRecord>,
    #[serde(default)]
    pub keepsake_version: Option<String>,
}

impl ExperimentRecord {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub experiment_id: String,
    pub last_heartbeat: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_id_truncates_to_seven_chars() {
        assert_eq!(short_id("1eeeeb5e5c2a4f0e"), "1eeeeb5");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_experiment_record_tolerates_missing_optional_fields() {
        let raw = json!({
            "id": "1eeeeb5e5c2a4f0e",
            "created": "2020-11-25T12:34:56.123456Z",
            "params": {"lr": 0.01},
        });
        let rec: ExperimentRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(rec.params["lr"], json!(0.01));
        assert!(rec.checkpoints.is_empty());
        assert_eq!(rec.user, "");
    }

    #[test]
    fn test_primary_metric_value_requires_numeric_metric() {
        let mut chk = CheckpointRecord {
            id: "c0ffee".into(),
            created: Utc::now(),
            metrics: HashMap::from([("loss".to_string(), json!("n/a"))]),
            step: Some(1),
            path: None,
            primary_metric: Some(PrimaryMetric { name: "loss".into(), goal: Goal::Minimize }),
        };
        assert_eq!(chk.primary_metric_value(), None);

        chk.metrics.insert("loss".into(), json!(0.25));
        assert_eq!(chk.primary_metric_value(), Some(0.25));

        chk.primary_metric = None;
        assert_eq!(chk.primary_metric_value(), None);
    }
}
