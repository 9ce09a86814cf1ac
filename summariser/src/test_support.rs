use crate::model::DerivedMetrics;
use campaign_core::prelude::decode;
use campaign_run_model::RunRecord;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

static RUN_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A frame in the default layout.
pub(crate) fn frame(counter: f64, done: f64, containers: f64, running: usize) -> Vec<Value> {
    vec![
        json!(counter),
        Value::Array(vec![json!({"r": 1}); running]),
        json!([]),
        json!(10.0),
        json!(1.0),
        json!(20.0),
        json!(counter * 1.5),
        json!(-1.0),
        json!(done),
        json!(0.5),
        json!(0.25),
        json!(0.1),
        json!(5.0),
        json!(0.01),
        json!(containers),
    ]
}

/// Write a run file for `fingerprint` and return its name.
pub(crate) fn write_run(
    dir: &Path,
    fingerprint: &str,
    frames: Vec<Vec<Value>>,
) -> anyhow::Result<String> {
    let n = RUN_COUNTER.fetch_add(1, Ordering::SeqCst);
    let file_name = format!("{fingerprint}.UTC_2024_01_01_00_00_00_{n:09}");
    let record = RunRecord {
        record_name: file_name.clone(),
        fingerprint: None,
        frames,
    };
    std::fs::write(dir.join(&file_name), serde_json::to_vec(&record)?)?;
    Ok(file_name)
}

pub(crate) fn metrics(file_name: &str, fingerprint: &str, cost: f64, latency: f64) -> DerivedMetrics {
    DerivedMetrics {
        file_name: file_name.to_string(),
        fingerprint: fingerprint.to_string(),
        flat: decode(fingerprint),
        sample_count: 1,
        cost,
        latency,
        latency_std: 0.0,
        latency_p90: 0.0,
        score: 0.0,
        throughput: 0.0,
        cold_start_wait: 0.0,
        schedule_wait: 0.0,
        data_recv_time: 0.0,
        exec_time: 0.0,
        algo_exec_time: 0.0,
        avg_containers: 0.0,
        unfinished_requests: 0.0,
        spread: BTreeMap::new(),
    }
}
