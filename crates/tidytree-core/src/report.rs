//! Batch result payloads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A single failed entry inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// The path that caused the error.
    pub path: PathBuf,
    /// A human-readable error message.
    pub message: String,
}

impl OperationError {
    /// Create a new operation error.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Kind of action taken on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Delete,
    Move,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delete => write!(f, "delete"),
            Self::Move => write!(f, "move"),
        }
    }
}

/// One action performed, or planned under dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub source: PathBuf,
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

/// Outcome of one batch: a rule application, an organize pass or a
/// duplicate removal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub files_processed: usize,
    pub files_moved: usize,
    pub files_deleted: usize,
    pub duplicates_removed: usize,
    pub directories_created: usize,
    pub space_freed_bytes: u64,
    pub dry_run: bool,
    pub actions: Vec<ActionRecord>,
    pub errors: Vec<OperationError>,
}

impl BatchReport {
    /// Create an empty report.
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Count a deletion that freed `bytes`.
    pub fn record_delete(&mut self, source: impl Into<PathBuf>, bytes: u64) {
        self.files_processed += 1;
        self.files_deleted += 1;
        self.space_freed_bytes += bytes;
        self.actions.push(ActionRecord {
            source: source.into(),
            kind: ActionKind::Delete,
            destination: None,
        });
    }

    /// Count a move to `destination`.
    pub fn record_move(&mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) {
        self.files_processed += 1;
        self.files_moved += 1;
        self.actions.push(ActionRecord {
            source: source.into(),
            kind: ActionKind::Move,
            destination: Some(destination.into()),
        });
    }

    /// Count a directory created on the way to a destination.
    pub fn record_dir_created(&mut self) {
        self.directories_created += 1;
    }

    /// Add a per-entry error.
    pub fn add_error(&mut self, path: &Path, message: impl Into<String>) {
        self.errors.push(OperationError::new(path, message));
    }

    /// Check if any entry failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of entries acted upon (or planned).
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}

/// Totals over many batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub operations: usize,
    pub files_processed: usize,
    pub files_moved: usize,
    pub files_deleted: usize,
    pub duplicates_removed: usize,
    pub space_freed_bytes: u64,
    pub error_count: usize,
}

impl Summary {
    /// Fold one report into the totals.
    pub fn add(&mut self, report: &BatchReport) {
        self.operations += 1;
        self.files_processed += report.files_processed;
        self.files_moved += report.files_moved;
        self.files_deleted += report.files_deleted;
        self.duplicates_removed += report.duplicates_removed;
        self.space_freed_bytes += report.space_freed_bytes;
        self.error_count += report.errors.len();
    }

    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a BatchReport>) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.add(report);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counters() {
        let mut report = BatchReport::new(false);
        report.record_delete("/a", 10);
        report.record_move("/b", "/dest/b");
        report.add_error(Path::new("/c"), "denied");

        assert_eq!(report.files_processed, 2);
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.files_moved, 1);
        assert_eq!(report.space_freed_bytes, 10);
        assert_eq!(report.action_count(), 2);
        assert!(report.has_errors());
        assert_eq!(report.errors[0].to_string(), "/c: denied");
    }

    #[test]
    fn test_summary_from_reports() {
        let mut a = BatchReport::new(false);
        a.record_delete("/a", 5);
        let mut b = BatchReport::new(false);
        b.duplicates_removed = 2;
        b.space_freed_bytes = 7;
        b.add_error(Path::new("/x"), "gone");

        let summary = Summary::from_reports([&a, &b]);
        assert_eq!(summary.operations, 2);
        assert_eq!(summary.space_freed_bytes, 12);
        assert_eq!(summary.duplicates_removed, 2);
        assert_eq!(summary.error_count, 1);
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = BatchReport::new(true);
        report.record_delete("/a", 1);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"kind\":\"delete\""));
        assert!(!json.contains("destination"));
        assert!(json.contains("\"dry_run\":true"));
    }
}
