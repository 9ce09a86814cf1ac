use campaign_core::prelude::Configuration;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Request to simulator endpoint {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Simulator endpoint {endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Malformed response from simulator endpoint {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    #[error("Simulator step finished without returning frames")]
    MissingFrames,
}

/// Identifies one simulator environment between `reset` and `step`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SessionHandle(pub Value);

/// The parts of a step response the harness keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub frames: Vec<Vec<Value>>,
    pub score: Option<f64>,
    pub stop: bool,
}

impl StepOutcome {
    /// Read a step outcome from the `kernel` object of a step response.
    ///
    /// Frames are taken from `kernel.frames`, or from `kernel.info.frames` for simulators that
    /// report them alongside the other run info.
    pub fn from_kernel(kernel: &Value) -> Result<Self, SimulatorError> {
        let frames = kernel
            .get("frames")
            .or_else(|| kernel.get("info").and_then(|info| info.get("frames")))
            .filter(|frames| !frames.is_null())
            .ok_or(SimulatorError::MissingFrames)?;

        let frames: Vec<Vec<Value>> =
            serde_json::from_value(frames.clone()).map_err(|e| SimulatorError::Malformed {
                endpoint: "step".to_string(),
                reason: format!("frames are not a list of arrays: {e}"),
            })?;
        if frames.is_empty() {
            return Err(SimulatorError::MissingFrames);
        }

        Ok(Self {
            frames,
            score: kernel.get("score").and_then(Value::as_f64),
            stop: kernel.get("stop").and_then(Value::as_bool).unwrap_or(true),
        })
    }
}

/// The external simulator, as seen by the run scheduler.
pub trait Simulator: Send + Sync {
    /// Start a new environment for `config`.
    fn reset(&self, config: &Configuration) -> Result<SessionHandle, SimulatorError>;

    /// Advance the environment, running the simulation to the end.
    fn step(&self, session: &SessionHandle, action: i64) -> Result<StepOutcome, SimulatorError>;
}

/// Talks to the simulator's HTTP API with blocking requests.
pub struct HttpSimulator {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSimulator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::config::Config::builder()
            .timeout_global(Some(timeout))
            .build()
            .new_agent();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn post(&self, endpoint: &str, body: &Value) -> Result<Value, SimulatorError> {
        let url = format!("{}/{endpoint}", self.base_url);
        log::trace!("POST {url}");

        let mut response = self
            .agent
            .post(&url)
            .send_json(body)
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => SimulatorError::Status {
                    endpoint: endpoint.to_string(),
                    status,
                },
                e => SimulatorError::Transport {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                },
            })?;

        let value: Value =
            response
                .body_mut()
                .read_json()
                .map_err(|e| SimulatorError::Malformed {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })?;

        value
            .get("kernel")
            .cloned()
            .ok_or_else(|| SimulatorError::Malformed {
                endpoint: endpoint.to_string(),
                reason: "missing `kernel`".to_string(),
            })
    }
}

impl Simulator for HttpSimulator {
    fn reset(&self, config: &Configuration) -> Result<SessionHandle, SimulatorError> {
        let kernel = self.post("reset", &json!({ "config": config.to_wire() }))?;
        kernel
            .get("env_id")
            .cloned()
            .map(SessionHandle)
            .ok_or_else(|| SimulatorError::Malformed {
                endpoint: "reset".to_string(),
                reason: "missing `kernel.env_id`".to_string(),
            })
    }

    fn step(&self, session: &SessionHandle, action: i64) -> Result<StepOutcome, SimulatorError> {
        let kernel = self.post("step", &json!({ "action": action, "env_id": session }))?;
        StepOutcome::from_kernel(&kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_from_kernel_or_info() {
        let direct = json!({"frames": [[0, []]], "score": 1.5, "stop": true});
        let outcome = StepOutcome::from_kernel(&direct).unwrap();
        assert_eq!(1, outcome.frames.len());
        assert_eq!(Some(1.5), outcome.score);

        let nested = json!({"info": {"frames": [[0, []], [1, []]]}, "stop": false});
        let outcome = StepOutcome::from_kernel(&nested).unwrap();
        assert_eq!(2, outcome.frames.len());
        assert!(!outcome.stop);
    }

    #[test]
    fn missing_or_empty_frames_are_errors() {
        assert!(matches!(
            StepOutcome::from_kernel(&json!({"score": 1})),
            Err(SimulatorError::MissingFrames)
        ));
        assert!(matches!(
            StepOutcome::from_kernel(&json!({"frames": []})),
            Err(SimulatorError::MissingFrames)
        ));
        assert!(matches!(
            StepOutcome::from_kernel(&json!({"frames": "nope"})),
            Err(SimulatorError::Malformed { .. })
        ));
    }

    #[test]
    fn unreachable_simulator_is_a_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept connections
        let sim = HttpSimulator::new("http://127.0.0.1:9", Duration::from_millis(500));
        let err = sim.reset(&Configuration::default()).unwrap_err();
        assert!(matches!(err, SimulatorError::Transport { .. }), "{err}");
    }
}
