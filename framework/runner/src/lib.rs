mod campaign;
pub mod cli;
mod progress;
mod scheduler;
mod shutdown;
mod simulator;
mod status;

pub mod prelude {
    pub use crate::campaign::{run_campaign, CampaignOptions, CampaignSummary};
    pub use crate::scheduler::{EnsureOutcome, RunScheduler};
    pub use crate::shutdown::start_shutdown_listener;
    pub use crate::simulator::{
        HttpSimulator, SessionHandle, Simulator, SimulatorError, StepOutcome,
    };
    pub use crate::status::{render_status, status_rows, StatusRow};
}
