mod common;

use campaign_core::prelude::{encode, AxisKind, ConfigError, Fingerprint};
use campaign_run_model::RunStore;
use campaign_runner::prelude::*;
use common::{complete_config, ScriptedSimulator};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn run_files(store: &RunStore, fingerprint: &Fingerprint) -> Vec<String> {
    std::fs::read_dir(store.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with(&format!("{fingerprint}.UTC_")))
        .collect()
}

#[test]
fn fills_deficit_with_new_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(RunStore::open(dir.path())?);
    let scheduler = RunScheduler::new(ScriptedSimulator::default(), store.clone());
    let config = complete_config();
    let fingerprint = encode(&config);

    // Two runs already recorded
    store.persist(&fingerprint, vec![])?;
    store.persist(&fingerprint, vec![])?;

    let outcome = scheduler.ensure_runs(&config, 5)?;
    assert_eq!(
        EnsureOutcome {
            fingerprint: fingerprint.clone(),
            existing: 2,
            issued: 3,
            persisted: 3,
            target: 5,
        },
        outcome
    );
    assert_eq!(5, store.count(&fingerprint));
    assert_eq!(5, run_files(&store, &fingerprint).len());

    let record = store.read_record(&store.files_for(&fingerprint)[4])?;
    assert_eq!(10, record.frames.len());
    Ok(())
}

#[test]
fn second_call_issues_nothing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(RunStore::open(dir.path())?);
    let scheduler = RunScheduler::new(ScriptedSimulator::default(), store.clone());
    let config = complete_config();

    assert_eq!(3, scheduler.ensure_runs(&config, 3)?.issued);
    let again = scheduler.ensure_runs(&config, 3)?;
    assert_eq!(0, again.issued);
    assert_eq!(3, again.existing);
    assert_eq!(0, again.remaining());

    // A lower target never removes runs
    assert_eq!(0, scheduler.ensure_runs(&config, 1)?.issued);
    assert_eq!(3, store.count(&encode(&config)));
    Ok(())
}

#[test]
fn simulator_failure_leaves_deficit() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(RunStore::open(dir.path())?);
    let scheduler = RunScheduler::new(ScriptedSimulator::failing_on_step(2), store.clone());
    let config = complete_config();
    let fingerprint = encode(&config);

    let err = scheduler.ensure_runs(&config, 4).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulatorError>(),
        Some(SimulatorError::Status { status: 500, .. })
    ));
    assert_eq!(1, store.count(&fingerprint));
    assert_eq!(1, run_files(&store, &fingerprint).len());

    // The next invocation picks up the rest
    let scheduler = RunScheduler::new(ScriptedSimulator::default(), store.clone());
    let outcome = scheduler.ensure_runs(&config, 4)?;
    assert_eq!(1, outcome.existing);
    assert_eq!(3, outcome.persisted);
    Ok(())
}

#[test]
fn dry_run_never_calls_simulator() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(RunStore::open(dir.path())?);
    let scheduler =
        RunScheduler::new(ScriptedSimulator::default(), store.clone()).with_dry_run(true);

    let outcome = scheduler.ensure_runs(&complete_config(), 2)?;
    assert_eq!(0, outcome.issued);
    assert_eq!(2, outcome.remaining());
    assert_eq!(0, store.count(&outcome.fingerprint));
    Ok(())
}

#[test]
fn incomplete_configuration_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(RunStore::open(dir.path())?);
    let scheduler = RunScheduler::new(ScriptedSimulator::default(), store);

    let mut config = complete_config();
    config.clear(AxisKind::Sche);
    let err = scheduler.ensure_runs(&config, 1).unwrap_err();
    assert_eq!(
        Some(&ConfigError::NoActiveCandidate(AxisKind::Sche)),
        err.downcast_ref::<ConfigError>()
    );
    Ok(())
}

#[test]
fn shutdown_stops_before_next_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(RunStore::open(dir.path())?);
    let handle = campaign_core::prelude::ShutdownHandle::new();
    let scheduler = RunScheduler::new(ScriptedSimulator::default(), store)
        .with_shutdown_listener(handle.new_listener());

    handle.shutdown();
    let outcome = scheduler.ensure_runs(&complete_config(), 3)?;
    assert_eq!(0, outcome.issued);
    assert_eq!(3, outcome.remaining());
    Ok(())
}
