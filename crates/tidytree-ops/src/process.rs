//! Registered-process termination with grace periods.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, Signal, System};
use tracing::{debug, info, warn};

use tidytree_core::TidyError;

use crate::recorder::DEFAULT_HISTORY_CAPACITY;

/// Signal sent to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Ask the process to exit.
    Terminate,
    /// Stop the process unconditionally.
    Kill,
}

/// Process liveness and signalling.
pub trait ProcessProvider: Send + Sync {
    /// Whether `pid` refers to a live (non-zombie) process.
    fn exists(&self, pid: u32) -> bool;

    /// Send a signal to `pid`.
    fn signal(&self, pid: u32, kind: SignalKind) -> Result<(), TidyError>;
}

/// [`ProcessProvider`] backed by the OS process table.
#[derive(Debug, Default)]
pub struct SysinfoProvider {
    system: Mutex<System>,
}

impl SysinfoProvider {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl ProcessProvider for SysinfoProvider {
    fn exists(&self, pid: u32) -> bool {
        let Ok(mut system) = self.system.lock() else {
            return false;
        };
        let pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .is_some_and(|p| p.status() != ProcessStatus::Zombie)
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> Result<(), TidyError> {
        let mut system = self.system.lock().map_err(|_| TidyError::Process {
            pid,
            message: "process table lock poisoned".to_string(),
        })?;
        let sys_pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        let process = system.process(sys_pid).ok_or_else(|| TidyError::Process {
            pid,
            message: "no such process".to_string(),
        })?;

        let sent = match kind {
            SignalKind::Terminate => process.kill_with(Signal::Term).unwrap_or_else(|| process.kill()),
            SignalKind::Kill => process.kill(),
        };
        if sent {
            Ok(())
        } else {
            Err(TidyError::Process {
                pid,
                message: format!("failed to send {kind:?}"),
            })
        }
    }
}

/// Result of a terminate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminateOutcome {
    Terminated,
    StillRunning,
}

/// How a registered process is stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CleanupStrategy {
    /// Terminate, wait the full timeout, then kill.
    #[default]
    Graceful,
    /// Kill immediately.
    Force,
    /// Terminate with the wait capped at ten seconds, then kill.
    Timeout,
}

/// A process under management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedProcess {
    pub pid: u32,
    pub command: String,
    pub registered_at: SystemTime,
    pub cleanup_attempts: u32,
}

/// One cleanup attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupRecord {
    pub pid: u32,
    pub command: String,
    pub strategy: CleanupStrategy,
    pub success: bool,
    pub timestamp: SystemTime,
}

/// Cleanup totals over the retained history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupStats {
    pub total_cleanups: usize,
    pub successful_cleanups: usize,
    /// Percentage of successful cleanups.
    pub success_rate: f64,
    pub active_processes: usize,
    pub strategy_usage: BTreeMap<String, usize>,
}

const TIMEOUT_STRATEGY_CAP: Duration = Duration::from_secs(10);

/// Tracks registered processes and stops them on request.
pub struct ProcessReaper<P: ProcessProvider> {
    provider: P,
    registry: Mutex<HashMap<u32, ManagedProcess>>,
    history: Mutex<VecDeque<CleanupRecord>>,
    poll_interval: Duration,
    kill_grace: Duration,
}

impl ProcessReaper<SysinfoProvider> {
    /// Reaper over the OS process table.
    pub fn system() -> Self {
        Self::new(SysinfoProvider::new())
    }
}

impl<P: ProcessProvider> ProcessReaper<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            registry: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            poll_interval: Duration::from_millis(100),
            kill_grace: Duration::from_secs(5),
        }
    }

    /// Set how often liveness is polled while waiting.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how long to wait after a kill before giving up.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Put a process under management.
    pub fn register(&self, pid: u32, command: impl Into<String>) {
        let command = command.into();
        info!(pid, command = %command, "registered process");
        self.lock_registry().insert(
            pid,
            ManagedProcess {
                pid,
                command,
                registered_at: SystemTime::now(),
                cleanup_attempts: 0,
            },
        );
    }

    /// Snapshot of registered processes, by PID.
    pub fn registered(&self) -> Vec<ManagedProcess> {
        let mut list: Vec<_> = self.lock_registry().values().cloned().collect();
        list.sort_by_key(|p| p.pid);
        list
    }

    pub fn is_registered(&self, pid: u32) -> bool {
        self.lock_registry().contains_key(&pid)
    }

    /// Send terminate, wait up to `grace`, escalate to kill.
    pub fn terminate(&self, pid: u32, grace: Duration) -> Result<TerminateOutcome, TidyError> {
        if !self.provider.exists(pid) {
            return Ok(TerminateOutcome::Terminated);
        }

        self.send(pid, SignalKind::Terminate)?;
        if self.wait_for_exit(pid, grace) {
            return Ok(TerminateOutcome::Terminated);
        }

        debug!(pid, "grace period elapsed, killing");
        self.kill(pid)
    }

    fn kill(&self, pid: u32) -> Result<TerminateOutcome, TidyError> {
        self.send(pid, SignalKind::Kill)?;
        if self.wait_for_exit(pid, self.kill_grace) {
            Ok(TerminateOutcome::Terminated)
        } else {
            warn!(pid, "process survived kill");
            Ok(TerminateOutcome::StillRunning)
        }
    }

    fn send(&self, pid: u32, kind: SignalKind) -> Result<(), TidyError> {
        match self.provider.signal(pid, kind) {
            Ok(()) => Ok(()),
            // exited between the liveness check and the signal
            Err(_) if !self.provider.exists(pid) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.provider.exists(pid) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Stop a registered process. Returns `false` for unknown PIDs and for
    /// processes that could not be stopped; a stopped process is unregistered.
    pub fn cleanup(&self, pid: u32, strategy: CleanupStrategy, timeout: Duration) -> bool {
        let command = {
            let mut registry = self.lock_registry();
            match registry.get_mut(&pid) {
                Some(process) => {
                    process.cleanup_attempts += 1;
                    process.command.clone()
                }
                None => {
                    warn!(pid, "process not registered");
                    return false;
                }
            }
        };

        let outcome = match strategy {
            CleanupStrategy::Graceful => self.terminate(pid, timeout),
            CleanupStrategy::Timeout => self.terminate(pid, timeout.min(TIMEOUT_STRATEGY_CAP)),
            CleanupStrategy::Force => {
                if self.provider.exists(pid) {
                    self.kill(pid)
                } else {
                    Ok(TerminateOutcome::Terminated)
                }
            }
        };

        let success = match outcome {
            Ok(TerminateOutcome::Terminated) => true,
            Ok(TerminateOutcome::StillRunning) => false,
            Err(err) => {
                warn!(pid, error = %err, "cleanup failed");
                false
            }
        };

        if success {
            self.lock_registry().remove(&pid);
            info!(pid, %strategy, "process cleaned up");
        }
        self.push_history(CleanupRecord {
            pid,
            command,
            strategy,
            success,
            timestamp: SystemTime::now(),
        });
        success
    }

    /// Clean up every registered process.
    pub fn cleanup_all(&self, strategy: CleanupStrategy, timeout: Duration) -> BTreeMap<u32, bool> {
        self.registered()
            .into_iter()
            .map(|p| (p.pid, self.cleanup(p.pid, strategy, timeout)))
            .collect()
    }

    /// Drop registered processes that no longer exist. Returns their PIDs.
    pub fn reap_vanished(&self) -> Vec<u32> {
        let mut registry = self.lock_registry();
        let mut gone: Vec<u32> = registry
            .keys()
            .copied()
            .filter(|pid| !self.provider.exists(*pid))
            .collect();
        gone.sort_unstable();
        for pid in &gone {
            registry.remove(pid);
            debug!(pid, "reaped vanished process");
        }
        gone
    }

    fn push_history(&self, record: CleanupRecord) {
        let mut history = self.lock_history();
        if history.len() >= DEFAULT_HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(record);
    }

    fn lock_registry(&self) -> MutexGuard<'_, HashMap<u32, ManagedProcess>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> MutexGuard<'_, VecDeque<CleanupRecord>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The newest `limit` cleanup records, oldest first.
    pub fn history(&self, limit: usize) -> Vec<CleanupRecord> {
        let history = self.lock_history();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> CleanupStats {
        let mut stats = CleanupStats {
            active_processes: self.lock_registry().len(),
            ..CleanupStats::default()
        };
        let history = self.lock_history();
        stats.total_cleanups = history.len();
        for record in history.iter() {
            if record.success {
                stats.successful_cleanups += 1;
            }
            *stats
                .strategy_usage
                .entry(record.strategy.to_string())
                .or_default() += 1;
        }
        if stats.total_cleanups > 0 {
            stats.success_rate =
                stats.successful_cleanups as f64 / stats.total_cleanups as f64 * 100.0;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// In-memory process table. A process listed in `stubborn` ignores
    /// terminate; one in `unkillable` ignores everything.
    #[derive(Default)]
    struct FakeProcesses {
        alive: Mutex<HashSet<u32>>,
        stubborn: HashSet<u32>,
        unkillable: HashSet<u32>,
        signals: Mutex<Vec<(u32, SignalKind)>>,
    }

    impl FakeProcesses {
        fn with(alive: &[u32]) -> Self {
            Self {
                alive: Mutex::new(alive.iter().copied().collect()),
                ..Self::default()
            }
        }
    }

    impl ProcessProvider for FakeProcesses {
        fn exists(&self, pid: u32) -> bool {
            self.alive.lock().unwrap().contains(&pid)
        }

        fn signal(&self, pid: u32, kind: SignalKind) -> Result<(), TidyError> {
            self.signals.lock().unwrap().push((pid, kind));
            let mut alive = self.alive.lock().unwrap();
            if !alive.contains(&pid) {
                return Err(TidyError::Process {
                    pid,
                    message: "no such process".into(),
                });
            }
            let dies = match kind {
                SignalKind::Terminate => !self.stubborn.contains(&pid) && !self.unkillable.contains(&pid),
                SignalKind::Kill => !self.unkillable.contains(&pid),
            };
            if dies {
                alive.remove(&pid);
            }
            Ok(())
        }
    }

    fn reaper(provider: FakeProcesses) -> ProcessReaper<FakeProcesses> {
        ProcessReaper::new(provider)
            .with_poll_interval(Duration::from_millis(1))
            .with_kill_grace(Duration::from_millis(20))
    }

    #[test]
    fn test_terminate_cooperative() {
        let reaper = reaper(FakeProcesses::with(&[10]));
        let outcome = reaper.terminate(10, Duration::from_millis(20)).unwrap();
        assert_eq!(outcome, TerminateOutcome::Terminated);
        let signals = reaper.provider().signals.lock().unwrap().clone();
        assert_eq!(signals, vec![(10, SignalKind::Terminate)]);
    }

    #[test]
    fn test_terminate_escalates_to_kill() {
        let mut provider = FakeProcesses::with(&[11]);
        provider.stubborn.insert(11);
        let reaper = reaper(provider);

        let outcome = reaper.terminate(11, Duration::from_millis(10)).unwrap();
        assert_eq!(outcome, TerminateOutcome::Terminated);
        let signals = reaper.provider().signals.lock().unwrap().clone();
        assert_eq!(signals, vec![(11, SignalKind::Terminate), (11, SignalKind::Kill)]);
    }

    #[test]
    fn test_terminate_still_running() {
        let mut provider = FakeProcesses::with(&[12]);
        provider.unkillable.insert(12);
        let reaper = reaper(provider);

        let outcome = reaper.terminate(12, Duration::from_millis(10)).unwrap();
        assert_eq!(outcome, TerminateOutcome::StillRunning);
    }

    #[test]
    fn test_terminate_already_gone() {
        let reaper = reaper(FakeProcesses::with(&[]));
        assert_eq!(
            reaper.terminate(99, Duration::from_millis(10)).unwrap(),
            TerminateOutcome::Terminated
        );
        assert!(reaper.provider().signals.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_unregisters_and_records() {
        let reaper = reaper(FakeProcesses::with(&[20, 21]));
        reaper.register(20, "sleep 100");
        reaper.register(21, "sleep 200");

        assert!(reaper.cleanup(20, CleanupStrategy::Force, Duration::from_millis(10)));
        assert!(!reaper.is_registered(20));
        assert!(reaper.is_registered(21));
        assert!(!reaper.cleanup(999, CleanupStrategy::Graceful, Duration::from_millis(10)));

        let history = reaper.history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].command, "sleep 100");

        let stats = reaper.stats();
        assert_eq!(stats.total_cleanups, 1);
        assert_eq!(stats.active_processes, 1);
        assert_eq!(stats.success_rate, 100.0);
        assert_eq!(stats.strategy_usage.get("force"), Some(&1));
    }

    #[test]
    fn test_failed_cleanup_keeps_registration() {
        let mut provider = FakeProcesses::with(&[30]);
        provider.unkillable.insert(30);
        let reaper = reaper(provider);
        reaper.register(30, "zombie-maker");

        assert!(!reaper.cleanup(30, CleanupStrategy::Timeout, Duration::from_millis(5)));
        assert!(reaper.is_registered(30));
        assert_eq!(reaper.registered()[0].cleanup_attempts, 1);
        assert_eq!(reaper.stats().success_rate, 0.0);
    }

    #[test]
    fn test_reap_vanished() {
        let reaper = reaper(FakeProcesses::with(&[40]));
        reaper.register(40, "alive");
        reaper.register(41, "dead");
        reaper.register(42, "dead too");

        assert_eq!(reaper.reap_vanished(), vec![41, 42]);
        assert_eq!(reaper.registered().len(), 1);
    }

    #[test]
    fn test_register_after_poisoned_lock() {
        let reaper = reaper(FakeProcesses::with(&[50]));
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = reaper.registry.lock().unwrap();
            panic!("poison registry");
        }));
        assert!(reaper.registry.is_poisoned());

        reaper.register(50, "survivor");
        assert!(reaper.is_registered(50));
        assert_eq!(reaper.registered().len(), 1);
    }

    #[test]
    fn test_cleanup_all() {
        let reaper = reaper(FakeProcesses::with(&[1, 2]));
        reaper.register(1, "a");
        reaper.register(2, "b");
        let results = reaper.cleanup_all(CleanupStrategy::Graceful, Duration::from_millis(10));
        assert_eq!(results.values().filter(|ok| **ok).count(), 2);
        assert!(reaper.registered().is_empty());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!("timeout".parse::<CleanupStrategy>().unwrap(), CleanupStrategy::Timeout);
        assert!("gentle".parse::<CleanupStrategy>().is_err());
    }
}
