//! Template/JSON context shaping: ordering, score rounding, time formatting.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, SecondsFormat, Utc};
use keepsake_common::CheckpointRecord;
use keepsake_store::Experiment;
use serde::Serialize;
use serde_json::Value;

/// Key-sorted copy of a params/metrics mapping.
pub fn sort_by_key(map: &HashMap<String, Value>) -> BTreeMap<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Round floats to 3 decimal places; integers, strings and null pass through.
pub fn format_score(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) => {
                let rounded = (f * 1000.0).round() / 1000.0;
                if rounded.is_finite() { Value::from(rounded) } else { value.clone() }
            }
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compact human duration, e.g. `1h 2m 3s`, `4m 0s`, `12s`.
pub fn format_duration(d: chrono::Duration) -> String {
    let total = d.num_seconds().max(0);
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

/// Newest first; id breaks ties so the order is total.
pub fn sort_newest_first(experiments: &mut [Experiment]) {
    experiments.sort_by(|a, b| b.created().cmp(&a.created()).then_with(|| b.id().cmp(a.id())));
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    pub id: String,
    pub short_id: String,
    pub created: String,
    pub user: String,
    pub duration: String,
    pub running: bool,
    pub primary_metric: Option<String>,
    pub score: Option<Value>,
}

impl ExperimentSummary {
    pub fn from_experiment(exp: &Experiment) -> Self {
        let primary_metric = exp.primary_metric().map(|pm| pm.name.clone());
        // Scored by the metric the best checkpoint was ranked on
        let score = exp.best().and_then(|best| {
            let name = &best.primary_metric.as_ref()?.name;
            best.metrics.get(name).map(format_score)
        });
        Self {
            id: exp.id().to_string(),
            short_id: exp.short_id().to_string(),
            created: format_timestamp(exp.created()),
            user: exp.user().to_string(),
            duration: format_duration(exp.duration()),
            running: exp.is_running(),
            primary_metric,
            score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckpointRow {
    pub id: String,
    pub short_id: String,
    pub created: String,
    pub step: Option<i64>,
    pub metrics: BTreeMap<String, Value>,
    pub is_best: bool,
}

impl CheckpointRow {
    fn new(chk: &CheckpointRecord, best_id: Option<&str>) -> Self {
        Self {
            id: chk.id.clone(),
            short_id: chk.short_id().to_string(),
            created: format_timestamp(chk.created),
            step: chk.step,
            metrics: sort_by_key(&chk.metrics),
            is_best: best_id == Some(chk.id.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentDetail {
    pub id: String,
    pub short_id: String,
    pub created: String,
    pub command: String,
    pub user: String,
    pub host: String,
    pub duration: String,
    pub running: bool,
    pub params: BTreeMap<String, Value>,
    pub checkpoints: Vec<CheckpointRow>,
    pub metric_names: Vec<String>,
    pub primary_metric: Option<String>,
    pub best: Option<CheckpointRow>,
    /// Metrics of the best checkpoint, empty when there is none.
    pub metrics: BTreeMap<String, Value>,
}

impl ExperimentDetail {
    pub fn from_experiment(exp: &Experiment) -> Self {
        let best = exp.best();
        let best_id = best.map(|c| c.id.as_str());
        let metric_names: BTreeSet<String> = exp
            .checkpoints()
            .iter()
            .flat_map(|c| c.metrics.keys().cloned())
            .collect();

        Self {
            id: exp.id().to_string(),
            short_id: exp.short_id().to_string(),
            created: format_timestamp(exp.created()),
            command: exp.command().to_string(),
            user: exp.user().to_string(),
            host: exp.host().to_string(),
            duration: format_duration(exp.duration()),
            running: exp.is_running(),
            params: sort_by_key(exp.params()),
            checkpoints: exp.checkpoints().iter().map(|c| CheckpointRow::new(c, best_id)).collect(),
            metric_names: metric_names.into_iter().collect(),
            primary_metric: exp.primary_metric().map(|pm| pm.name.clone()),
            best: best.map(|c| CheckpointRow::new(c, best_id)),
            metrics: best.map(|c| sort_by_key(&c.metrics)).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_by_key_orders_ascending() {
        let map = HashMap::from([("b".to_string(), json!(1)), ("a".to_string(), json!(2))]);
        let sorted: Vec<(String, Value)> = sort_by_key(&map).into_iter().collect();
        assert_eq!(sorted, vec![("a".to_string(), json!(2)), ("b".to_string(), json!(1))]);
    }

    #[test]
    fn test_format_score_rounds_only_floats() {
        assert_eq!(format_score(&json!(0.123456)), json!(0.123));
        assert_eq!(format_score(&json!(2.0006)), json!(2.001));
        assert_eq!(format_score(&json!(7)), json!(7));
        assert_eq!(format_score(&json!("high")), json!("high"));
        assert_eq!(format_score(&Value::Null), Value::Null);
    }

    #[test]
    fn test_format_score_keeps_huge_floats() {
        assert_eq!(format_score(&json!(1.0e308)), json!(1.0e308));
        assert_eq!(format_score(&json!(-1.0e308)), json!(-1.0e308));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::seconds(12)), "12s");
        assert_eq!(format_duration(chrono::Duration::seconds(240)), "4m 0s");
        assert_eq!(format_duration(chrono::Duration::seconds(3723)), "1h 2m 3s");
        assert_eq!(format_duration(chrono::Duration::seconds(-5)), "0s");
    }

    #[test]
    fn test_format_timestamp_is_rfc3339_utc() {
        let ts = DateTime::parse_from_rfc3339("2021-03-01T12:00:00.123456Z").unwrap().with_timezone(&Utc);
        assert_eq!(format_timestamp(ts), "2021-03-01T12:00:00Z");
    }
}
