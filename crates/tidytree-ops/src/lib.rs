//! Filesystem actions and bookkeeping for tidytree.
//!
//! - [`ActionExecutor`] deletes and moves single entries with conflict-safe
//!   naming and a dry-run switch.
//! - [`OperationRecorder`] keeps a bounded history of batch reports.
//! - [`ProcessReaper`] stops registered processes with a grace period.

mod executor;
mod process;
mod recorder;

pub use executor::{
    ActionExecutor, MAX_RENAME_ATTEMPTS, dir_size, free_destination_name,
    free_destination_name_excluding,
};
pub use process::{
    CleanupRecord, CleanupStats, CleanupStrategy, ManagedProcess, ProcessProvider, ProcessReaper,
    SignalKind, SysinfoProvider, TerminateOutcome,
};
pub use recorder::{DEFAULT_HISTORY_CAPACITY, OperationRecord, OperationRecorder};
