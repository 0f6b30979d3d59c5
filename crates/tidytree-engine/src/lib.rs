//! Cleanup, organization and duplicate removal for tidytree.
//!
//! These are the batch operations the CLI runs. Each one scans a tree,
//! decides what to do with every entry, acts through an
//! [`ActionExecutor`](tidytree_ops::ActionExecutor) and records a
//! [`BatchReport`](tidytree_core::BatchReport) in an
//! [`OperationRecorder`](tidytree_ops::OperationRecorder).
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tidytree_engine::RuleEngine;
//! use tidytree_ops::OperationRecorder;
//!
//! let engine = RuleEngine::with_defaults().unwrap().with_dry_run(true);
//! let mut recorder = OperationRecorder::default();
//! for (rule, report) in engine.apply_rules(Path::new("/tmp"), &mut recorder).unwrap() {
//!     println!("{rule}: {} entries", report.files_processed);
//! }
//! ```

mod dedupe;
mod maintenance;
mod organizer;
mod rules;

pub use dedupe::{DEFAULT_DUPLICATES_DIR, Disposition, DuplicateRemover, RemovalOptions};
pub use maintenance::{MaintenanceLoop, MaintenanceRun};
pub use organizer::{DEFAULT_DATE_FORMAT, Organizer};
pub use rules::{EMPTY_DIRS_OPERATION, RuleEngine};
