//! Rule-driven cleanup of a directory tree.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use tidytree_core::{
    BatchReport, CleanupRule, CleanupRuleSpec, FileRecord, RuleAction, ScanConfig, Settings,
    TidyError,
};
use tidytree_ops::{ActionExecutor, OperationRecorder};
use tidytree_scan::TreeScanner;

/// Operation name under which empty-directory removal is recorded.
pub const EMPTY_DIRS_OPERATION: &str = "remove_empty_dirs";

/// Ordered set of cleanup rules and the executor they act through.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<CleanupRule>,
    executor: ActionExecutor,
}

impl RuleEngine {
    /// An engine with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with the stock temp, cache and log rules registered.
    pub fn with_defaults() -> Result<Self, TidyError> {
        let mut engine = Self::new();
        for spec in CleanupRuleSpec::defaults() {
            engine.add_spec(spec)?;
        }
        Ok(engine)
    }

    /// Build from a settings file: default rules (if enabled), then the
    /// configured ones.
    pub fn from_settings(settings: &Settings) -> Result<Self, TidyError> {
        let mut engine = if settings.use_default_rules {
            Self::with_defaults()?
        } else {
            Self::new()
        };
        for spec in &settings.cleanup_rules {
            engine.add_spec(spec.clone())?;
        }
        engine.executor.use_trash = settings.use_trash;
        Ok(engine)
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.executor.dry_run = dry_run;
        self
    }

    pub fn with_trash(mut self, use_trash: bool) -> Self {
        self.executor.use_trash = use_trash;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.executor.dry_run
    }

    /// Register a compiled rule. Names must be unique.
    pub fn add_rule(&mut self, rule: CleanupRule) -> Result<(), TidyError> {
        if self.rule(rule.name()).is_some() {
            return Err(TidyError::validation(format!(
                "Rule '{}' is already registered",
                rule.name()
            )));
        }
        info!(rule = rule.name(), pattern = rule.pattern(), action = %rule.action(), "added cleanup rule");
        self.rules.push(rule);
        Ok(())
    }

    /// Compile and register a rule spec.
    pub fn add_spec(&mut self, spec: CleanupRuleSpec) -> Result<(), TidyError> {
        self.add_rule(CleanupRule::new(spec)?)
    }

    /// Registered rules in registration order.
    pub fn rules(&self) -> &[CleanupRule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&CleanupRule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    /// Apply every rule to `target_dir`, in registration order.
    ///
    /// Each rule gets its own report, which is also appended to `recorder`
    /// under the rule's name. Only a bad `target_dir` fails the call; entry
    /// failures land in the rule's report. Unreadable paths found while
    /// scanning are reported once, on the first rule.
    pub fn apply_rules(
        &self,
        target_dir: &Path,
        recorder: &mut OperationRecorder,
    ) -> Result<IndexMap<String, BatchReport>, TidyError> {
        let config = ScanConfig::builder()
            .root(target_dir)
            .include_dirs(true)
            .build()?;
        let scanner = TreeScanner::new();
        let now = SystemTime::now();

        let mut results = IndexMap::with_capacity(self.rules.len());
        for (index, rule) in self.rules.iter().enumerate() {
            let mut scan = scanner.scan(&config)?;
            let root = scan.root().to_path_buf();
            let destination = rule
                .resolved_destination(&root)
                .map(|dest| canonicalize_existing(&dest));

            let matches: Vec<FileRecord> = scan
                .by_ref()
                .filter(|record| {
                    destination
                        .as_ref()
                        .is_none_or(|dest| !record.path.starts_with(dest))
                })
                .filter(|record| rule.matches(record, &root, now))
                .collect();

            let mut report = BatchReport::new(self.executor.dry_run);
            if index == 0 {
                for warning in scan.warnings() {
                    report.add_error(&warning.path, warning.message.clone());
                }
            }

            self.apply_rule(rule, &matches, destination.as_deref(), &mut report);

            info!(
                rule = rule.name(),
                matched = matches.len(),
                processed = report.files_processed,
                freed = report.space_freed_bytes,
                errors = report.errors.len(),
                dry_run = report.dry_run,
                "applied cleanup rule"
            );
            recorder.record(rule.name(), report.clone());
            results.insert(rule.name().to_string(), report);
        }

        Ok(results)
    }

    fn apply_rule(
        &self,
        rule: &CleanupRule,
        matches: &[FileRecord],
        destination: Option<&Path>,
        report: &mut BatchReport,
    ) {
        // Directories removed or moved earlier in this batch
        let mut gone: Vec<PathBuf> = Vec::new();
        let mut reserved = HashSet::new();

        for record in matches {
            if gone.iter().any(|dir| record.path.starts_with(dir)) {
                continue;
            }
            if !self.executor.dry_run && fs::symlink_metadata(&record.path).is_err() {
                debug!(path = %record.path.display(), "entry vanished, skipping");
                continue;
            }

            let result = match (rule.action(), destination) {
                (RuleAction::Delete, _) => self
                    .executor
                    .delete(&record.path)
                    .map(|bytes| report.record_delete(&record.path, bytes)),
                (RuleAction::Move, Some(dest)) => self
                    .executor
                    .move_to_reserving(&record.path, dest, &mut reserved)
                    .map(|target| {
                        if target != record.path {
                            report.record_move(&record.path, target);
                        }
                    }),
                (RuleAction::Move, None) => Err(TidyError::validation(format!(
                    "Rule '{}' has no destination",
                    rule.name()
                ))),
            };

            match result {
                Ok(()) => {
                    if record.is_dir {
                        gone.push(record.path.clone());
                    }
                }
                Err(err) if err.is_not_found() => {
                    debug!(path = %record.path.display(), "entry vanished, skipping");
                }
                Err(err) => {
                    warn!(rule = rule.name(), path = %record.path.display(), error = %err, "cleanup action failed");
                    report.add_error(&record.path, err.to_string());
                }
            }
        }
    }

    /// Remove empty directories below `target_dir`, deepest first.
    ///
    /// A directory whose only children were removed earlier in the same
    /// run counts as empty, so whole empty chains go at once, in dry runs
    /// too. `target_dir` itself is kept. The report is recorded as
    /// [`EMPTY_DIRS_OPERATION`].
    pub fn remove_empty_dirs(
        &self,
        target_dir: &Path,
        recorder: &mut OperationRecorder,
    ) -> Result<BatchReport, TidyError> {
        let config = ScanConfig::builder()
            .root(target_dir)
            .include_dirs(true)
            .build()?;
        let mut scan = TreeScanner::new().scan(&config)?;

        let mut dirs: Vec<PathBuf> = scan
            .by_ref()
            .filter(|record| record.is_dir)
            .map(|record| record.path)
            .collect();
        dirs.sort_by_key(|dir| Reverse(dir.components().count()));

        let mut report = BatchReport::new(self.executor.dry_run);
        for warning in scan.warnings() {
            report.add_error(&warning.path, warning.message.clone());
        }

        let mut removed: HashSet<PathBuf> = HashSet::new();
        for dir in dirs {
            match is_empty_without(&dir, &removed) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    report.add_error(&dir, err.to_string());
                    continue;
                }
            }
            if !self.executor.dry_run {
                if let Err(err) = fs::remove_dir(&dir) {
                    warn!(path = %dir.display(), error = %err, "could not remove empty directory");
                    report.add_error(&dir, err.to_string());
                    continue;
                }
            }
            debug!(path = %dir.display(), dry_run = self.executor.dry_run, "removed empty directory");
            report.record_delete(&dir, 0);
            removed.insert(dir);
        }

        info!(
            removed = report.files_processed,
            errors = report.errors.len(),
            dry_run = report.dry_run,
            "removed empty directories"
        );
        recorder.record(EMPTY_DIRS_OPERATION, report.clone());
        Ok(report)
    }
}

/// Whether `dir` has no children other than those in `removed`.
fn is_empty_without(dir: &Path, removed: &HashSet<PathBuf>) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        if !removed.contains(&entry?.path()) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolve symlinks and `..` in the part of `path` that exists.
pub(crate) fn canonicalize_existing(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
