mod common;

use campaign_core::prelude::{encode, Configuration, SweepPlan};
use campaign_run_model::RunStore;
use campaign_runner::prelude::*;
use common::ScriptedSimulator;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;

const PLAN: &str = r#"
run_time: 2
params:
  request_freq:
    - low
    - high
mech_scale_sche:
  scale_sche_joint:
    scale_num:
      - hpa: null
      - lass: null
    scale_down_exec:
      - default: null
    scale_up_exec:
      - least_task: null
    sche:
      - greedy: null
      - pos: null
mech_other:
  instance_cache_policy:
    - no_evict: null
"#;

fn options(parallel: bool) -> CampaignOptions {
    CampaignOptions {
        parallel,
        show_progress: false,
    }
}

#[test]
fn campaign_fills_every_configuration() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(RunStore::open(dir.path())?);
    let scheduler = RunScheduler::new(ScriptedSimulator::default(), store.clone());
    let plan = SweepPlan::from_yaml(PLAN)?;

    let summary = run_campaign(&scheduler, Configuration::default(), &plan, &options(false))?;
    assert_eq!(
        CampaignSummary {
            configurations: 8,
            already_complete: 0,
            runs_issued: 16,
            runs_persisted: 16,
            runs_remaining: 0,
            interrupted: false,
        },
        summary
    );
    assert_eq!(8, store.index().len());
    assert!(store.index().values().all(|files| files.len() == 2));

    // Resuming does nothing
    let again = run_campaign(&scheduler, Configuration::default(), &plan, &options(false))?;
    assert_eq!(8, again.already_complete);
    assert_eq!(0, again.runs_issued);
    Ok(())
}

#[test]
fn parallel_campaign_matches_sequential() -> anyhow::Result<()> {
    let plan = SweepPlan::from_yaml(PLAN)?;

    let sequential_dir = tempfile::tempdir()?;
    let sequential_store = Arc::new(RunStore::open(sequential_dir.path())?);
    let scheduler = RunScheduler::new(ScriptedSimulator::default(), sequential_store.clone());
    run_campaign(&scheduler, Configuration::default(), &plan, &options(false))?;

    let parallel_dir = tempfile::tempdir()?;
    let parallel_store = Arc::new(RunStore::open(parallel_dir.path())?);
    let scheduler = RunScheduler::new(ScriptedSimulator::default(), parallel_store.clone());
    let summary = run_campaign(&scheduler, Configuration::default(), &plan, &options(true))?;
    assert_eq!(16, summary.runs_persisted);

    assert_eq!(
        sequential_store.index().keys().collect::<Vec<_>>(),
        parallel_store.index().keys().collect::<Vec<_>>()
    );
    Ok(())
}

#[test]
fn campaign_sends_every_configuration_to_simulator() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(RunStore::open(dir.path())?);
    let plan = SweepPlan::from_yaml(PLAN)?;
    let scheduler = RunScheduler::new(ScriptedSimulator::default(), store);

    run_campaign(&scheduler, Configuration::default(), &plan, &options(false))?;
    let fingerprints = scheduler
        .store()
        .index()
        .into_keys()
        .collect::<HashSet<_>>();

    let mut seen = HashSet::new();
    let mut driver = campaign_core::prelude::SweepDriver::new(Configuration::default());
    driver.run(&plan, |config| -> anyhow::Result<()> {
        seen.insert(encode(config));
        Ok(())
    })?;
    assert_eq!(seen, fingerprints);
    Ok(())
}

#[test]
fn failing_run_aborts_campaign() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(RunStore::open(dir.path())?);
    let scheduler = RunScheduler::new(ScriptedSimulator::failing_on_step(3), store.clone());
    let plan = SweepPlan::from_yaml(PLAN)?;

    assert!(run_campaign(&scheduler, Configuration::default(), &plan, &options(false)).is_err());
    let recorded = store.index().values().map(Vec::len).sum::<usize>();
    assert_eq!(2, recorded);
    Ok(())
}
