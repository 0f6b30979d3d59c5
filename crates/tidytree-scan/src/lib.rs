//! Directory tree scanning for tidytree.
//!
//! The scanner walks a directory with jwalk in serial, name-sorted order and
//! yields one [`FileRecord`] per matching entry. The walk is lazy: entries are
//! read and their metadata taken only as the iterator advances.
//!
//! # Example
//!
//! ```rust,no_run
//! use tidytree_scan::{ScanConfig, TreeScanner};
//!
//! let config = ScanConfig::builder()
//!     .root("/path/to/scan")
//!     .pattern("*.log")
//!     .build()
//!     .unwrap();
//!
//! let mut scan = TreeScanner::new().scan(&config).unwrap();
//! for record in scan.by_ref() {
//!     println!("{} ({} bytes)", record.path.display(), record.size);
//! }
//! for warning in scan.warnings() {
//!     eprintln!("skipped {warning}");
//! }
//! ```

mod scanner;

pub use scanner::{Scan, TreeScanner};

// Re-export core types for convenience
pub use tidytree_core::{FileRecord, ScanConfig, ScanWarning, TidyError, WarningKind};
