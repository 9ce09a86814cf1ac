use campaign_core::prelude::{AxisKind, Configuration};
use campaign_runner::prelude::{SessionHandle, Simulator, SimulatorError, StepOutcome};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An in-memory simulator that returns canned frames and can be told to fail.
#[derive(Default)]
pub struct ScriptedSimulator {
    pub resets: AtomicUsize,
    pub steps: AtomicUsize,
    /// Fail the step with this (1-based) number
    pub fail_on_step: Option<usize>,
    pub configs: Mutex<Vec<Configuration>>,
}

impl ScriptedSimulator {
    pub fn failing_on_step(step: usize) -> Self {
        Self {
            fail_on_step: Some(step),
            ..Default::default()
        }
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}

impl Simulator for ScriptedSimulator {
    fn reset(&self, config: &Configuration) -> Result<SessionHandle, SimulatorError> {
        let id = self.resets.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().push(config.clone());
        Ok(SessionHandle(json!(id)))
    }

    fn step(&self, _session: &SessionHandle, action: i64) -> Result<StepOutcome, SimulatorError> {
        assert_eq!(1, action);
        let step = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_step == Some(step) {
            return Err(SimulatorError::Status {
                endpoint: "step".to_string(),
                status: 500,
            });
        }

        Ok(StepOutcome {
            frames: (0..10).map(|frame| vec![json!(frame), json!([])]).collect(),
            score: Some(1.0),
            stop: true,
        })
    }
}

pub fn complete_config() -> Configuration {
    let mut config = Configuration::default();
    config.apply(AxisKind::MechType, "scale_sche_joint", "").unwrap();
    config.apply(AxisKind::ScaleNum, "hpa", "").unwrap();
    config.apply(AxisKind::ScaleDownExec, "default", "").unwrap();
    config.apply(AxisKind::ScaleUpExec, "least_task", "").unwrap();
    config.apply(AxisKind::Sche, "greedy", "").unwrap();
    config.apply(AxisKind::InstanceCachePolicy, "no_evict", "").unwrap();
    config
}
