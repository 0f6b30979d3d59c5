//! Moving files into destination folders by rule, type or date.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use tracing::{info, warn};

use tidytree_core::{
    BatchReport, FileRecord, OrganizationRule, OrganizationRuleSpec, ScanConfig, Settings,
    TemplateContext, TidyError, category_for, size_bucket_for,
};
use tidytree_ops::{ActionExecutor, OperationRecorder};
use tidytree_scan::TreeScanner;

/// Default folder layout for date-based organization.
pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m";

/// Sorts files under a source directory into folders.
#[derive(Debug, Clone)]
pub struct Organizer {
    rules: Vec<OrganizationRule>,
    categories: BTreeMap<String, Vec<String>>,
    size_buckets: BTreeMap<String, u64>,
    ignore: Vec<String>,
}

impl Default for Organizer {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            rules: Vec::new(),
            categories: settings.categories,
            size_buckets: settings.size_buckets,
            ignore: Vec::new(),
        }
    }
}

impl Organizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules, categories and the duplicates folder exclusion from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, TidyError> {
        let mut organizer = Self {
            rules: Vec::new(),
            categories: settings.categories.clone(),
            size_buckets: settings.size_buckets.clone(),
            ignore: vec![settings.duplicates_dir.clone()],
        };
        for spec in &settings.organization_rules {
            organizer.add_spec(spec.clone())?;
        }
        Ok(organizer)
    }

    /// Replace the extension table used by [`organize_by_type`](Self::organize_by_type).
    pub fn with_categories(mut self, categories: BTreeMap<String, Vec<String>>) -> Self {
        self.categories = categories;
        self
    }

    /// Replace the bucket table used by [`organize_by_size`](Self::organize_by_size).
    pub fn with_size_buckets(mut self, buckets: BTreeMap<String, u64>) -> Self {
        self.size_buckets = buckets;
        self
    }

    /// Folder names that are never descended into.
    pub fn with_ignored(mut self, names: Vec<String>) -> Self {
        self.ignore = names;
        self
    }

    /// Register a rule. Names must be unique.
    pub fn add_rule(&mut self, rule: OrganizationRule) -> Result<(), TidyError> {
        if self.rules.iter().any(|r| r.name() == rule.name()) {
            return Err(TidyError::validation(format!(
                "Rule '{}' is already registered",
                rule.name()
            )));
        }
        info!(rule = rule.name(), destination = %rule.template(), "added organization rule");
        self.rules.push(rule);
        Ok(())
    }

    pub fn add_spec(&mut self, spec: OrganizationRuleSpec) -> Result<(), TidyError> {
        self.add_rule(OrganizationRule::new(spec)?)
    }

    pub fn rules(&self) -> &[OrganizationRule] {
        &self.rules
    }

    /// Move each file to the destination of the first rule that matches it.
    pub fn organize(
        &self,
        source: &Path,
        dry_run: bool,
        recorder: &mut OperationRecorder,
    ) -> Result<BatchReport, TidyError> {
        let now = SystemTime::now();
        let report = self.run(source, dry_run, |record, root| {
            let rule = self.rules.iter().find(|r| r.matches(record, root, now))?;
            let ctx = TemplateContext::for_file(&record.path, record.modified);
            Some(rule.template().expand(&ctx, root))
        })?;
        recorder.record("organize", report.clone());
        Ok(report)
    }

    /// Move each file into a folder named after its extension's category.
    pub fn organize_by_type(
        &self,
        source: &Path,
        dry_run: bool,
        recorder: &mut OperationRecorder,
    ) -> Result<BatchReport, TidyError> {
        let report = self.run(source, dry_run, |record, root| {
            let ext = record
                .path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            Some(root.join(category_for(&self.categories, &ext)))
        })?;
        recorder.record("organize_by_type", report.clone());
        Ok(report)
    }

    /// Move each file into a folder derived from its modification date.
    pub fn organize_by_date(
        &self,
        source: &Path,
        format: &str,
        dry_run: bool,
        recorder: &mut OperationRecorder,
    ) -> Result<BatchReport, TidyError> {
        check_date_format(format)?;
        let report = self.run(source, dry_run, |record, root| {
            date_folder(record.modified, format).map(|folder| root.join(folder))
        })?;
        recorder.record("organize_by_date", report.clone());
        Ok(report)
    }

    /// Move each file into the size bucket folder its length falls in.
    pub fn organize_by_size(
        &self,
        source: &Path,
        dry_run: bool,
        recorder: &mut OperationRecorder,
    ) -> Result<BatchReport, TidyError> {
        let report = self.run(source, dry_run, |record, root| {
            size_bucket_for(&self.size_buckets, record.size).map(|bucket| root.join(bucket))
        })?;
        recorder.record("organize_by_size", report.clone());
        Ok(report)
    }

    /// Scan `source`, then move every file for which `destination` yields a
    /// folder it is not already inside.
    fn run<F>(&self, source: &Path, dry_run: bool, destination: F) -> Result<BatchReport, TidyError>
    where
        F: Fn(&FileRecord, &Path) -> Option<PathBuf>,
    {
        let config = ScanConfig::builder()
            .root(source)
            .ignore_patterns(self.ignore.clone())
            .build()?;
        let mut scan = TreeScanner::new().scan(&config)?;
        let root = scan.root().to_path_buf();
        let records: Vec<FileRecord> = scan.by_ref().collect();

        let executor = ActionExecutor::new().with_dry_run(dry_run);
        let mut report = BatchReport::new(dry_run);
        for warning in scan.warnings() {
            report.add_error(&warning.path, warning.message.clone());
        }

        let mut created: HashSet<PathBuf> = HashSet::new();
        let mut reserved: HashSet<PathBuf> = HashSet::new();
        for record in &records {
            let Some(dest_dir) = destination(record, &root) else {
                continue;
            };
            if record.path.starts_with(&dest_dir) {
                continue;
            }

            if !created.contains(&dest_dir) {
                match executor.ensure_dir(&dest_dir) {
                    Ok(true) => {
                        report.record_dir_created();
                        created.insert(dest_dir.clone());
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(path = %dest_dir.display(), error = %err, "cannot create destination");
                        report.add_error(&record.path, err.to_string());
                        continue;
                    }
                }
            }

            match executor.move_to_reserving(&record.path, &dest_dir, &mut reserved) {
                Ok(target) if target == record.path => {}
                Ok(target) => report.record_move(&record.path, target),
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    warn!(path = %record.path.display(), error = %err, "organize failed");
                    report.add_error(&record.path, err.to_string());
                }
            }
        }

        info!(
            source = %root.display(),
            moved = report.files_moved,
            dirs = report.directories_created,
            errors = report.errors.len(),
            dry_run,
            "organize finished"
        );
        Ok(report)
    }
}

fn check_date_format(format: &str) -> Result<(), TidyError> {
    if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(TidyError::InvalidConfig {
            message: format!("invalid date format '{format}'"),
        });
    }
    Ok(())
}

fn date_folder(modified: SystemTime, format: &str) -> Option<String> {
    let date = DateTime::<Local>::from(modified);
    let mut folder = String::new();
    write!(folder, "{}", date.format(format)).ok()?;
    Some(folder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_format_validation() {
        assert!(check_date_format("%Y/%m").is_ok());
        assert!(check_date_format("%Y-%m-%d").is_ok());
        assert!(check_date_format("%Q").is_err());
        assert!(check_date_format("").is_err());
    }

    #[test]
    fn test_date_folder() {
        let folder = date_folder(SystemTime::now(), DEFAULT_DATE_FORMAT).unwrap();
        let parts: Vec<_> = folder.split('/').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 4);
        assert_eq!(parts[1].len(), 2);
    }

    #[test]
    fn test_duplicate_rule_name_rejected() {
        let spec = OrganizationRuleSpec::builder()
            .name("images")
            .pattern("*.png")
            .destination("images")
            .build()
            .unwrap();
        let mut organizer = Organizer::new();
        organizer.add_spec(spec.clone()).unwrap();
        assert!(organizer.add_spec(spec).is_err());
    }
}
