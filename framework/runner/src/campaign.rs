use crate::progress::start_progress;
use crate::scheduler::{EnsureOutcome, RunScheduler};
use crate::simulator::Simulator;
use anyhow::Context;
use campaign_core::prelude::{Configuration, SweepDriver, SweepPlan};
use indicatif::ProgressBar;
use parking_lot::Mutex;

#[derive(Debug, Clone, Default)]
pub struct CampaignOptions {
    /// Sweep each outer scalar combination on its own thread
    pub parallel: bool,
    pub show_progress: bool,
}

/// Totals over every configuration a campaign visited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignSummary {
    pub configurations: usize,
    pub already_complete: usize,
    pub runs_issued: usize,
    pub runs_persisted: usize,
    pub runs_remaining: usize,
    pub interrupted: bool,
}

impl CampaignSummary {
    fn record(&mut self, outcome: &EnsureOutcome) {
        self.configurations += 1;
        if outcome.existing >= outcome.target {
            self.already_complete += 1;
        }
        self.runs_issued += outcome.issued;
        self.runs_persisted += outcome.persisted;
        self.runs_remaining += outcome.remaining();
    }

    fn merge(&mut self, other: CampaignSummary) {
        self.configurations += other.configurations;
        self.already_complete += other.already_complete;
        self.runs_issued += other.runs_issued;
        self.runs_persisted += other.runs_persisted;
        self.runs_remaining += other.runs_remaining;
        self.interrupted |= other.interrupted;
    }
}

/// Ensure `plan.run_time` runs for every configuration of the sweep.
///
/// The first failure aborts the campaign. Everything recorded up to that point stays recorded, so
/// running the same campaign again resumes where this one stopped.
pub fn run_campaign<S: Simulator>(
    scheduler: &RunScheduler<S>,
    baseline: Configuration,
    plan: &SweepPlan,
    options: &CampaignOptions,
) -> anyhow::Result<CampaignSummary> {
    plan.validate().context("Invalid sweep plan")?;

    let total = plan.combination_count();
    log::info!(
        "Sweeping {total} configurations with {} runs each",
        plan.run_time
    );
    let progress = start_progress(total, options.show_progress);

    let summary = if options.parallel {
        run_parallel(scheduler, baseline, plan, &progress)?
    } else {
        let mut summary = CampaignSummary::default();
        let mut driver = SweepDriver::new(baseline);
        driver.run(plan, |config| {
            visit(scheduler, config, plan.run_time, &progress, &mut summary)
        })?;
        summary
    };

    progress.finish_and_clear();
    Ok(summary)
}

fn visit<S: Simulator>(
    scheduler: &RunScheduler<S>,
    config: &Configuration,
    target: usize,
    progress: &ProgressBar,
    summary: &mut CampaignSummary,
) -> anyhow::Result<()> {
    if scheduler.is_shutting_down() {
        summary.interrupted = true;
        return Ok(());
    }

    let outcome = scheduler.ensure_runs(config, target)?;
    summary.record(&outcome);
    if scheduler.is_shutting_down() && outcome.remaining() > 0 {
        summary.interrupted = true;
    }

    progress.set_message(outcome.fingerprint.to_string());
    progress.inc(1);
    Ok(())
}

fn run_parallel<S: Simulator>(
    scheduler: &RunScheduler<S>,
    baseline: Configuration,
    plan: &SweepPlan,
    progress: &ProgressBar,
) -> anyhow::Result<CampaignSummary> {
    let combinations = plan.scalar_combinations();
    log::info!(
        "Running {} scalar combinations in parallel",
        combinations.len()
    );

    let results = Mutex::new(Vec::with_capacity(combinations.len()));
    std::thread::scope(|scope| {
        for combination in &combinations {
            let mut config = baseline.clone();
            for (field, value) in combination {
                config.set_scalar(*field, value.as_str());
            }

            let results = &results;
            scope.spawn(move || {
                let mut summary = CampaignSummary::default();
                let mut driver = SweepDriver::new(config);
                let result = driver.run_mechanisms(plan, |config| {
                    visit(scheduler, config, plan.run_time, progress, &mut summary)
                });
                results.lock().push(result.map(|_| summary));
            });
        }
    });

    let mut summary = CampaignSummary::default();
    for result in results.into_inner() {
        summary.merge(result?);
    }
    Ok(summary)
}
