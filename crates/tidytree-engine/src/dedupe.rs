//! Duplicate removal: index a tree, keep one file per class, dispose of the rest.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tidytree_analyze::{DuplicateIndex, partition};
use tidytree_core::{BatchReport, FileRecord, KeepPolicy, ScanConfig, Settings, TidyError};
use tidytree_ops::{ActionExecutor, OperationRecorder};
use tidytree_scan::TreeScanner;

use crate::rules::canonicalize_existing;

/// Default folder for removed duplicates, relative to the scanned root.
pub const DEFAULT_DUPLICATES_DIR: &str = "_duplicates";

/// What happens to a removal candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Move into a folder; relative paths are taken from the scanned root.
    MoveTo(PathBuf),
    /// Delete outright (or send to trash).
    Delete,
}

impl Default for Disposition {
    fn default() -> Self {
        Self::MoveTo(PathBuf::from(DEFAULT_DUPLICATES_DIR))
    }
}

/// Options for one removal pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalOptions {
    pub keep: KeepPolicy,
    pub disposition: Disposition,
    pub dry_run: bool,
    pub use_trash: bool,
}

impl RemovalOptions {
    /// Keep policy, duplicates folder and trash mode from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            keep: settings.keep,
            disposition: Disposition::MoveTo(PathBuf::from(&settings.duplicates_dir)),
            dry_run: false,
            use_trash: settings.use_trash,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Removes duplicate files under a root.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateRemover;

impl DuplicateRemover {
    pub fn new() -> Self {
        Self
    }

    /// Index `root` and dispose of every duplicate the keep policy does not
    /// retain. The duplicates folder itself is never indexed.
    pub fn remove(
        &self,
        root: &Path,
        options: &RemovalOptions,
        recorder: &mut OperationRecorder,
    ) -> Result<BatchReport, TidyError> {
        let config = ScanConfig::new(root);
        let mut scan = TreeScanner::new().scan(&config)?;
        let root = scan.root().to_path_buf();

        let dup_dir = match &options.disposition {
            Disposition::MoveTo(dir) if dir.is_absolute() => Some(canonicalize_existing(dir)),
            Disposition::MoveTo(dir) => Some(root.join(dir)),
            Disposition::Delete => None,
        };

        let records: Vec<FileRecord> = scan
            .by_ref()
            .filter(|r| dup_dir.as_ref().is_none_or(|d| !r.path.starts_with(d)))
            .collect();

        let mut report = BatchReport::new(options.dry_run);
        for warning in scan.warnings() {
            report.add_error(&warning.path, warning.message.clone());
        }

        let index = DuplicateIndex::build(records);
        for warning in index.skipped() {
            report.add_error(&warning.path, warning.message.clone());
        }

        let executor = ActionExecutor::new()
            .with_dry_run(options.dry_run)
            .with_trash(options.use_trash);

        if let Some(dir) = &dup_dir {
            if index.len() > 0 {
                match executor.ensure_dir(dir) {
                    Ok(true) => report.record_dir_created(),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(path = %dir.display(), error = %err, "cannot create duplicates folder");
                        report.add_error(dir, err.to_string());
                        return Ok(self.finish(report, recorder));
                    }
                }
            }
        }

        let mut reserved: HashSet<PathBuf> = HashSet::new();
        for (fingerprint, class) in index.classes() {
            let Some(retention) = partition(class, options.keep) else {
                continue;
            };
            debug!(
                fingerprint = %fingerprint.short(),
                kept = %retention.kept.path.display(),
                candidates = retention.candidates.len(),
                "duplicate class"
            );

            for candidate in retention.candidates {
                let result = match &dup_dir {
                    Some(dir) => executor
                        .move_to_reserving(&candidate.path, dir, &mut reserved)
                        .map(|target| {
                            report.record_move(&candidate.path, target);
                            report.space_freed_bytes += candidate.size;
                        }),
                    None => executor
                        .delete(&candidate.path)
                        .map(|bytes| report.record_delete(&candidate.path, bytes)),
                };

                match result {
                    Ok(()) => report.duplicates_removed += 1,
                    Err(err) => {
                        warn!(path = %candidate.path.display(), error = %err, "duplicate removal failed");
                        report.add_error(&candidate.path, err.to_string());
                    }
                }
            }
        }

        info!(
            root = %root.display(),
            classes = index.len(),
            removed = report.duplicates_removed,
            freed = report.space_freed_bytes,
            dry_run = options.dry_run,
            "duplicate removal finished"
        );
        Ok(self.finish(report, recorder))
    }

    fn finish(&self, report: BatchReport, recorder: &mut OperationRecorder) -> BatchReport {
        recorder.record("remove_duplicates", report.clone());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = RemovalOptions::default();
        assert_eq!(options.keep, KeepPolicy::KeepFirst);
        assert_eq!(
            options.disposition,
            Disposition::MoveTo(PathBuf::from("_duplicates"))
        );
        assert!(!options.dry_run);
    }

    #[test]
    fn test_options_from_settings() {
        let mut settings = Settings::default();
        settings.keep = KeepPolicy::KeepLast;
        settings.duplicates_dir = "dupes".to_string();
        let options = RemovalOptions::from_settings(&settings).with_dry_run(true);
        assert_eq!(options.keep, KeepPolicy::KeepLast);
        assert_eq!(options.disposition, Disposition::MoveTo(PathBuf::from("dupes")));
        assert!(options.dry_run);
    }
}
