use crate::simulator::Simulator;
use anyhow::Context;
use campaign_core::prelude::{encode, Configuration, Fingerprint, ShutdownListener};
use campaign_run_model::RunStore;
use std::sync::Arc;

/// What [RunScheduler::ensure_runs] found and did for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureOutcome {
    pub fingerprint: Fingerprint,
    /// Runs recorded before the call
    pub existing: usize,
    /// Simulator runs started
    pub issued: usize,
    /// Runs written to the store
    pub persisted: usize,
    /// Target run count
    pub target: usize,
}

impl EnsureOutcome {
    /// Runs still missing after the call.
    pub fn remaining(&self) -> usize {
        self.target.saturating_sub(self.existing + self.persisted)
    }
}

/// Tops up the recorded runs of each configuration to a target count.
pub struct RunScheduler<S> {
    simulator: S,
    store: Arc<RunStore>,
    action: i64,
    dry_run: bool,
    shutdown_listener: Option<ShutdownListener>,
}

impl<S: Simulator> RunScheduler<S> {
    pub fn new(simulator: S, store: Arc<RunStore>) -> Self {
        Self {
            simulator,
            store,
            action: 1,
            dry_run: false,
            shutdown_listener: None,
        }
    }

    /// Action sent with the single step of every run.
    pub fn with_action(mut self, action: i64) -> Self {
        self.action = action;
        self
    }

    /// Only compute and log deficits, never call the simulator.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Stop starting new runs once a shutdown has been requested.
    pub fn with_shutdown_listener(mut self, listener: ShutdownListener) -> Self {
        self.shutdown_listener = Some(listener);
        self
    }

    pub fn store(&self) -> &Arc<RunStore> {
        &self.store
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_listener
            .as_ref()
            .is_some_and(ShutdownListener::should_shutdown)
    }

    /// Make sure at least `target` runs are recorded for `config`.
    ///
    /// Issues `max(0, target - existing)` simulator runs, persisting each one before starting the
    /// next. A simulator failure is returned immediately; runs persisted before it stay counted and
    /// the rest of the deficit is left for the next call.
    pub fn ensure_runs(
        &self,
        config: &Configuration,
        target: usize,
    ) -> anyhow::Result<EnsureOutcome> {
        config.validate()?;
        let fingerprint = encode(config);

        let lock = self.store.fingerprint_lock(&fingerprint);
        let _guard = lock.lock();

        let existing = self.store.count(&fingerprint);
        let deficit = target.saturating_sub(existing);
        let mut outcome = EnsureOutcome {
            fingerprint,
            existing,
            issued: 0,
            persisted: 0,
            target,
        };

        if deficit == 0 {
            log::debug!(
                "{} already has {existing} of {target} runs",
                outcome.fingerprint
            );
            return Ok(outcome);
        }

        if self.dry_run {
            log::info!(
                "{} needs {deficit} more runs ({existing} of {target})",
                outcome.fingerprint
            );
            return Ok(outcome);
        }

        log::info!(
            "Running {deficit} runs for {} ({existing} of {target})",
            outcome.fingerprint
        );
        for _ in 0..deficit {
            if self.is_shutting_down() {
                log::warn!(
                    "Shutdown requested, leaving {} runs for {}",
                    outcome.remaining(),
                    outcome.fingerprint
                );
                break;
            }

            outcome.issued += 1;
            let session = self
                .simulator
                .reset(config)
                .with_context(|| format!("Failed to reset simulator for {}", outcome.fingerprint))?;
            let step = self
                .simulator
                .step(&session, self.action)
                .with_context(|| format!("Simulator run failed for {}", outcome.fingerprint))?;

            self.store
                .persist(&outcome.fingerprint, step.frames)
                .with_context(|| format!("Failed to record run for {}", outcome.fingerprint))?;
            outcome.persisted += 1;
        }

        Ok(outcome)
    }
}
