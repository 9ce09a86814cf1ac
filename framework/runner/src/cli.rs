use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "campaign-runner", about, long_about = None)]
pub struct CampaignRunnerCli {
    /// Harness settings file (TOML). Defaults are used when not given.
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    /// Base URL of the simulator, overriding the settings file.
    ///
    /// Falls back to the `SIM_URL` environment variable.
    #[clap(long)]
    pub sim_url: Option<String>,

    /// Directory holding the run files and the manifest, overriding the settings file.
    ///
    /// Falls back to the `RECORDS_DIR` environment variable.
    #[clap(long)]
    pub records_dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: RunnerCommand,
}

#[derive(Subcommand, Debug)]
pub enum RunnerCommand {
    /// Run a sweep, topping up every configuration to the plan's `run_time` runs
    Sweep {
        /// The sweep plan (YAML)
        plan: PathBuf,

        /// Baseline configuration (YAML) for the fields the plan does not sweep
        #[clap(long)]
        baseline: Option<PathBuf>,

        /// Only report how many runs each configuration is missing
        #[clap(long, default_value = "false")]
        dry_run: bool,

        /// Sweep each combination of the plan's scalar fields on its own thread
        #[clap(long, default_value = "false")]
        parallel: bool,

        /// Do not show a progress bar on the CLI.
        ///
        /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
        #[clap(long, default_value = "false")]
        no_progress: bool,
    },

    /// List recorded fingerprints and their run counts
    Status {
        /// Also show how many runs are missing towards this target
        #[clap(long)]
        target: Option<usize>,
    },

    /// Re-index the records directory, counting run files written by other tools
    RebuildManifest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sweep_flags() {
        let cli = CampaignRunnerCli::parse_from([
            "campaign-runner",
            "--sim-url",
            "http://sim:3000",
            "sweep",
            "plan.yml",
            "--dry-run",
            "--no-progress",
        ]);
        assert_eq!(Some("http://sim:3000".to_string()), cli.sim_url);
        match cli.command {
            RunnerCommand::Sweep {
                plan,
                dry_run,
                parallel,
                no_progress,
                ..
            } => {
                assert_eq!(PathBuf::from("plan.yml"), plan);
                assert!(dry_run);
                assert!(!parallel);
                assert!(no_progress);
            }
            other => panic!("Unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_status_target() {
        let cli = CampaignRunnerCli::parse_from(["campaign-runner", "status", "--target", "5"]);
        assert!(matches!(cli.command, RunnerCommand::Status { target: Some(5) }));
    }
}
