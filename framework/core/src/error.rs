use crate::axis::AxisKind;
use thiserror::Error;

/// A violation of the configuration invariants.
///
/// These are never corrected silently. Whoever sees one should stop and report it, naming the
/// offending axis or fingerprint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown axis: {0}")]
    UnknownAxis(String),

    #[error("Unknown scalar field: {0}")]
    UnknownScalar(String),

    #[error("Unknown candidate `{candidate}` for axis {axis}")]
    UnknownCandidate { axis: AxisKind, candidate: String },

    #[error("Axis {axis} has multiple active candidates: {candidates:?}")]
    MultipleActive {
        axis: AxisKind,
        candidates: Vec<String>,
    },

    #[error("Axis {0} has no active candidate")]
    NoActiveCandidate(AxisKind),

    #[error("Value `{value}` for {field} cannot be written into a fingerprint")]
    UnencodableValue { field: String, value: String },
}
