//! Periodic cleanup in the background.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tidytree_core::{BatchReport, TidyError};
use tidytree_ops::{OperationRecorder, ProcessProvider, ProcessReaper, SysinfoProvider};

use crate::dedupe::{DuplicateRemover, RemovalOptions};
use crate::rules::RuleEngine;

/// Results of one maintenance pass.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceRun {
    /// Report per cleanup rule, in rule order.
    pub rules: IndexMap<String, BatchReport>,
    /// Duplicate removal report, when duplicate removal is enabled.
    pub duplicates: Option<BatchReport>,
    /// Registered processes found gone and dropped from the reaper.
    pub reaped: Vec<u32>,
}

enum PassError {
    Poisoned(&'static str),
    Failed(TidyError),
}

/// Background task that applies cleanup rules on an interval, optionally
/// followed by duplicate removal and reaping of vanished processes.
pub struct MaintenanceLoop<P: ProcessProvider = SysinfoProvider> {
    engine: Arc<Mutex<RuleEngine>>,
    recorder: Arc<Mutex<OperationRecorder>>,
    target: PathBuf,
    interval: Duration,
    dedupe: Option<RemovalOptions>,
    reaper: Option<Arc<ProcessReaper<P>>>,
}

impl MaintenanceLoop {
    /// A loop that only applies the engine's rules to `target`.
    pub fn new(
        engine: Arc<Mutex<RuleEngine>>,
        recorder: Arc<Mutex<OperationRecorder>>,
        target: PathBuf,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            recorder,
            target,
            interval,
            dedupe: None,
            reaper: None,
        }
    }
}

impl<P: ProcessProvider + 'static> MaintenanceLoop<P> {
    /// Remove duplicates under the target after the rules on every pass.
    pub fn with_dedupe(mut self, options: RemovalOptions) -> Self {
        self.dedupe = Some(options);
        self
    }

    /// Drop vanished processes from `reaper` at the end of every pass.
    pub fn with_reaper<Q: ProcessProvider>(self, reaper: Arc<ProcessReaper<Q>>) -> MaintenanceLoop<Q> {
        MaintenanceLoop {
            engine: self.engine,
            recorder: self.recorder,
            target: self.target,
            interval: self.interval,
            dedupe: self.dedupe,
            reaper: Some(reaper),
        }
    }

    /// Spawn the loop on the current tokio runtime.
    ///
    /// The first pass starts immediately. Each pass holds the engine and
    /// recorder locks for its whole duration on a blocking thread.
    /// Cancellation is checked between passes; a pass in progress always
    /// completes. The task resolves to the number of completed passes.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<usize> {
        let this = Arc::new(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut runs = 0usize;

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let pass = Arc::clone(&this);
                match tokio::task::spawn_blocking(move || pass.run_pass()).await {
                    Ok(Ok(run)) => {
                        runs += 1;
                        let processed: usize = run.rules.values().map(|r| r.files_processed).sum();
                        let freed: u64 = run.rules.values().map(|r| r.space_freed_bytes).sum();
                        let duplicates = run.duplicates.as_ref().map_or(0, |r| r.duplicates_removed);
                        info!(
                            run = runs,
                            processed,
                            freed,
                            duplicates,
                            reaped = run.reaped.len(),
                            "maintenance run complete"
                        );
                    }
                    Ok(Err(PassError::Failed(err))) => {
                        runs += 1;
                        warn!(error = %err, "maintenance run failed");
                    }
                    Ok(Err(PassError::Poisoned(lock))) => {
                        warn!("{lock} lock poisoned, stopping maintenance");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "maintenance task panicked, stopping");
                        break;
                    }
                }
            }

            info!(runs, "maintenance loop stopped");
            runs
        })
    }

    fn run_pass(&self) -> Result<MaintenanceRun, PassError> {
        let engine = self
            .engine
            .lock()
            .map_err(|_| PassError::Poisoned("rule engine"))?;
        let mut recorder = self
            .recorder
            .lock()
            .map_err(|_| PassError::Poisoned("recorder"))?;

        let rules = engine
            .apply_rules(&self.target, &mut recorder)
            .map_err(PassError::Failed)?;
        let duplicates = match &self.dedupe {
            Some(options) => Some(
                DuplicateRemover::new()
                    .remove(&self.target, options, &mut recorder)
                    .map_err(PassError::Failed)?,
            ),
            None => None,
        };
        let reaped = self
            .reaper
            .as_ref()
            .map(|reaper| reaper.reap_vanished())
            .unwrap_or_default();

        Ok(MaintenanceRun {
            rules,
            duplicates,
            reaped,
        })
    }
}
