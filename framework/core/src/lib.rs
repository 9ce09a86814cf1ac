pub mod axis;
pub mod config;
mod error;
pub mod fingerprint;
mod shutdown;
pub mod sweep;

pub mod prelude {
    pub use crate::axis::{
        AxisKind, Candidate, Filter, InstanceCachePolicy, MechType, ScaleDownExec, ScaleNum,
        ScaleUpExec, Sche, Selected,
    };
    pub use crate::config::{Configuration, Mechanism, ScalarField};
    pub use crate::error::ConfigError;
    pub use crate::fingerprint::{
        decode, encode, fingerprint_of_file, Fingerprint, FlatConfig, RUN_FILE_SEPARATOR,
    };
    pub use crate::shutdown::{ShutdownHandle, ShutdownListener};
    pub use crate::sweep::{Choice, FamilyAxes, FilterSet, SweepDriver, SweepPlan};
}
