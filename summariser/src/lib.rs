//! Turns the run files of a records directory into averaged, grouped comparison reports.

mod aggregator;
mod cache;
pub mod cli;
pub mod expr;
mod filter;
mod frame;
pub mod model;
mod partition;
pub mod report;
mod scaffold;
mod telemetry;

#[cfg(test)]
mod test_support;

pub use aggregator::{average, AggregateError};
pub use cache::TelemetryCache;
pub use filter::select_fingerprints;
pub use frame::{FrameField, FrameLayout, LoadError};
pub use partition::{group_by, Group};
pub use report::{generate_report, resolve_alias, ReportError, ReportSpec};
pub use scaffold::scaffold_report;
pub use telemetry::{derive_metrics, TelemetryLoader, DEFAULT_MIN_FRAMES};
