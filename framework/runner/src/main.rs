use anyhow::Context;
use campaign_core::prelude::{Configuration, SweepPlan};
use campaign_run_model::{HarnessSettings, RunStore};
use campaign_runner::cli::{CampaignRunnerCli, RunnerCommand};
use campaign_runner::prelude::*;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable name to set the simulator base URL
const SIM_URL_ENV: &str = "SIM_URL";
/// Environment variable name to set the records directory
const RECORDS_DIR_ENV: &str = "RECORDS_DIR";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = CampaignRunnerCli::parse();

    let mut settings = HarnessSettings::load(cli.config.as_deref())
        .context("Failed to load harness settings")?;
    if let Some(url) = cli.sim_url.or_else(|| std::env::var(SIM_URL_ENV).ok()) {
        settings.simulator.url = url;
    }
    if let Some(dir) = cli
        .records_dir
        .or_else(|| std::env::var(RECORDS_DIR_ENV).ok().map(PathBuf::from))
    {
        settings.storage.records_dir = dir;
    }
    log::debug!("Using settings {settings:?}");

    let store = Arc::new(RunStore::open(&settings.storage.records_dir)?);

    match cli.command {
        RunnerCommand::Sweep {
            plan,
            baseline,
            dry_run,
            parallel,
            no_progress,
        } => {
            let plan_content = std::fs::read_to_string(&plan)
                .with_context(|| format!("Failed to read sweep plan {}", plan.display()))?;
            let plan = SweepPlan::from_yaml(&plan_content).context("Invalid sweep plan")?;

            let baseline = match baseline {
                Some(path) => {
                    let content = std::fs::read_to_string(&path).with_context(|| {
                        format!("Failed to read baseline configuration {}", path.display())
                    })?;
                    Configuration::from_yaml(&content)
                        .context("Invalid baseline configuration")?
                }
                None => Configuration::default(),
            };

            let runtime =
                tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
            let shutdown_handle = start_shutdown_listener(&runtime)?;

            let simulator =
                HttpSimulator::new(settings.simulator.url.clone(), settings.simulator.timeout());
            let scheduler = RunScheduler::new(simulator, store.clone())
                .with_action(settings.simulator.action)
                .with_dry_run(dry_run)
                .with_shutdown_listener(shutdown_handle.new_listener());

            let summary = run_campaign(
                &scheduler,
                baseline,
                &plan,
                &CampaignOptions {
                    parallel,
                    show_progress: !no_progress,
                },
            )?;

            println!(
                "Visited {} configurations, {} already complete. Issued {} runs, recorded {}, {} still missing.",
                summary.configurations,
                summary.already_complete,
                summary.runs_issued,
                summary.runs_persisted,
                summary.runs_remaining,
            );
            if summary.interrupted {
                log::warn!("Campaign was interrupted, run it again to continue");
            }

            runtime.shutdown_background();
        }
        RunnerCommand::Status { target } => {
            let rows = status_rows(&store, target);
            if rows.is_empty() {
                println!("No runs recorded in {}", store.dir().display());
            } else {
                println!("{}", render_status(&rows));
            }
        }
        RunnerCommand::RebuildManifest => {
            let count = store.rebuild_manifest()?;
            println!(
                "Indexed {count} run files into {}",
                store.manifest_path().display()
            );
        }
    }

    Ok(())
}
