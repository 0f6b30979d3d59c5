//! Duplicate file detection by content fingerprint.
//!
//! Records are grouped by size first; a file whose size is unique cannot
//! have a duplicate and is never read. The remaining files are hashed in
//! full and grouped by fingerprint, keeping the order in which each class
//! was first discovered.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tidytree_core::{FileRecord, Fingerprint, ScanConfig, ScanWarning, TidyError};
use tidytree_scan::TreeScanner;

use crate::hasher::hash_file;

/// Configuration for duplicate detection.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate", error = "TidyError"))]
pub struct DuplicateConfig {
    /// Minimum file size to consider.
    #[builder(default = "0")]
    pub min_size: u64,

    /// Maximum file size to consider.
    #[builder(default = "u64::MAX")]
    pub max_size: u64,

    /// Skip hashing files whose size no other file shares.
    #[builder(default = "true")]
    pub size_prefilter: bool,

    /// Include hidden files when scanning.
    #[builder(default = "true")]
    pub include_hidden: bool,

    /// Entry names to prune from the scan.
    #[builder(default)]
    pub ignore_patterns: Vec<String>,
}

impl DuplicateConfigBuilder {
    fn validate(&self) -> Result<(), TidyError> {
        let min = self.min_size.unwrap_or(0);
        let max = self.max_size.unwrap_or(u64::MAX);
        if min > max {
            return Err(TidyError::validation(format!(
                "min_size ({min}) is larger than max_size ({max})"
            )));
        }
        Ok(())
    }
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: u64::MAX,
            size_prefilter: true,
            include_hidden: true,
            ignore_patterns: Vec::new(),
        }
    }
}

impl DuplicateConfig {
    /// Create a new config builder.
    pub fn builder() -> DuplicateConfigBuilder {
        DuplicateConfigBuilder::default()
    }

    fn accepts(&self, record: &FileRecord) -> bool {
        !record.is_dir && record.size >= self.min_size && record.size <= self.max_size
    }
}

/// Fingerprint to equivalence class, for one scan.
#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    classes: IndexMap<Fingerprint, Vec<FileRecord>>,
    skipped: Vec<ScanWarning>,
    files_hashed: usize,
}

impl DuplicateIndex {
    /// Hash and group records with the default configuration.
    pub fn build(records: impl IntoIterator<Item = FileRecord>) -> Self {
        Self::build_with(records, &DuplicateConfig::default())
    }

    /// Hash and group records.
    ///
    /// Files that cannot be hashed are left out and reported through
    /// [`skipped`](Self::skipped). Only classes with two or more members are
    /// kept.
    pub fn build_with(records: impl IntoIterator<Item = FileRecord>, config: &DuplicateConfig) -> Self {
        let records: Vec<FileRecord> = records.into_iter().filter(|r| config.accepts(r)).collect();

        let mut size_counts: HashMap<u64, usize> = HashMap::new();
        if config.size_prefilter {
            for record in &records {
                *size_counts.entry(record.size).or_default() += 1;
            }
        }

        let mut classes: IndexMap<Fingerprint, Vec<FileRecord>> = IndexMap::new();
        let mut skipped = Vec::new();
        let mut files_hashed = 0;

        for record in records {
            if config.size_prefilter && size_counts.get(&record.size).copied().unwrap_or(0) < 2 {
                continue;
            }
            match hash_file(&record.path) {
                Ok(fingerprint) => {
                    files_hashed += 1;
                    classes.entry(fingerprint).or_default().push(record);
                }
                Err(err) => {
                    warn!(path = %record.path.display(), error = %err, "skipping unhashable file");
                    skipped.push(ScanWarning::hash_failed(&record.path, &err));
                }
            }
        }

        classes.retain(|_, members| members.len() >= 2);
        debug!(
            classes = classes.len(),
            hashed = files_hashed,
            skipped = skipped.len(),
            "duplicate index built"
        );

        Self {
            classes,
            skipped,
            files_hashed,
        }
    }

    /// Equivalence classes in first-discovery order.
    pub fn classes(&self) -> impl Iterator<Item = (&Fingerprint, &[FileRecord])> {
        self.classes.iter().map(|(fp, members)| (fp, members.as_slice()))
    }

    /// Members sharing a fingerprint, if that fingerprint has duplicates.
    pub fn class(&self, fingerprint: &Fingerprint) -> Option<&[FileRecord]> {
        self.classes.get(fingerprint).map(Vec::as_slice)
    }

    /// Number of duplicate classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Files that could not be hashed.
    pub fn skipped(&self) -> &[ScanWarning] {
        &self.skipped
    }

    /// Number of files actually read and hashed.
    pub fn files_hashed(&self) -> usize {
        self.files_hashed
    }

    pub fn into_classes(self) -> IndexMap<Fingerprint, Vec<FileRecord>> {
        self.classes
    }
}

/// A group of duplicate files sharing the same content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Content fingerprint shared by all files in this group.
    pub fingerprint: Fingerprint,

    /// Size of each file in bytes.
    pub size: u64,

    /// Paths in discovery order.
    pub paths: Vec<PathBuf>,

    /// Wasted space: size * (count - 1).
    pub wasted_bytes: u64,
}

impl DuplicateGroup {
    fn from_class(fingerprint: Fingerprint, members: &[FileRecord]) -> Self {
        let size = members.first().map(|m| m.size).unwrap_or(0);
        Self {
            fingerprint,
            size,
            paths: members.iter().map(|m| m.path.clone()).collect(),
            wasted_bytes: size * (members.len() as u64).saturating_sub(1),
        }
    }

    /// Get the number of duplicate files.
    pub fn count(&self) -> usize {
        self.paths.len()
    }

    /// Check if keeping one file, how many could be removed.
    pub fn removable_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }
}

/// Results from duplicate analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups sorted by wasted space descending.
    pub groups: Vec<DuplicateGroup>,

    /// Number of files analyzed.
    pub files_analyzed: usize,

    /// Number of files that have duplicates.
    pub files_with_duplicates: usize,

    /// Total wasted space (could be reclaimed).
    pub total_wasted_space: u64,

    /// Entries that could not be read or hashed.
    pub skipped: Vec<ScanWarning>,
}

impl DuplicateReport {
    /// Summarize an index.
    pub fn from_index(index: &DuplicateIndex, files_analyzed: usize) -> Self {
        let mut groups: Vec<DuplicateGroup> = index
            .classes()
            .map(|(fp, members)| DuplicateGroup::from_class(*fp, members))
            .collect();
        groups.sort_by(|a, b| b.wasted_bytes.cmp(&a.wasted_bytes));

        Self {
            files_with_duplicates: groups.iter().map(DuplicateGroup::count).sum(),
            total_wasted_space: groups.iter().map(|g| g.wasted_bytes).sum(),
            groups,
            files_analyzed,
            skipped: index.skipped().to_vec(),
        }
    }

    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Scans a tree and reports duplicate groups.
#[derive(Debug, Clone, Default)]
pub struct DuplicateFinder {
    config: DuplicateConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new duplicate finder with custom config.
    pub fn with_config(config: DuplicateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DuplicateConfig {
        &self.config
    }

    /// Scan `root` and build an index of its duplicates.
    pub fn index(&self, root: &Path) -> Result<(DuplicateIndex, usize), TidyError> {
        let scan_config = ScanConfig::builder()
            .root(root)
            .include_hidden(self.config.include_hidden)
            .ignore_patterns(self.config.ignore_patterns.clone())
            .build()?;

        let mut scan = TreeScanner::new().scan(&scan_config)?;
        let records: Vec<FileRecord> = scan.by_ref().collect();
        let files_analyzed = records.iter().filter(|r| self.config.accepts(r)).count();

        let mut index = DuplicateIndex::build_with(records, &self.config);
        let mut warnings = scan.into_warnings();
        warnings.append(&mut index.skipped);
        index.skipped = warnings;

        Ok((index, files_analyzed))
    }

    /// Scan `root` and report duplicate groups.
    pub fn find(&self, root: &Path) -> Result<DuplicateReport, TidyError> {
        let (index, files_analyzed) = self.index(root)?;
        let report = DuplicateReport::from_index(&index, files_analyzed);
        info!(
            root = %root.display(),
            groups = report.group_count(),
            wasted = report.total_wasted_space,
            "duplicate scan finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_files() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        let content = "duplicate content here";
        fs::write(root.join("dup1.txt"), content).unwrap();
        fs::write(root.join("dup2.txt"), content).unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/dup3.txt"), content).unwrap();

        fs::write(root.join("unique.txt"), "something else entirely").unwrap();
        fs::write(root.join("same_size.txt"), "duplicate content HERE").unwrap();

        temp
    }

    #[test]
    fn test_find_duplicates() {
        let temp = create_test_files();
        let report = DuplicateFinder::new().find(temp.path()).unwrap();

        assert_eq!(report.group_count(), 1);
        let group = &report.groups[0];
        assert_eq!(group.count(), 3);
        assert_eq!(group.size, 22);
        assert_eq!(group.wasted_bytes, 44);
        assert_eq!(report.files_analyzed, 5);
        assert_eq!(report.files_with_duplicates, 3);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_prefilter_skips_unique_sizes() {
        let temp = create_test_files();
        let (index, _) = DuplicateFinder::new().index(temp.path()).unwrap();
        // unique.txt has a size nobody else has
        assert_eq!(index.files_hashed(), 4);

        let config = DuplicateConfig::builder().size_prefilter(false).build().unwrap();
        let (index, _) = DuplicateFinder::with_config(config).index(temp.path()).unwrap();
        assert_eq!(index.files_hashed(), 5);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_size_bounds() {
        let temp = create_test_files();
        let config = DuplicateConfig::builder().min_size(100u64).build().unwrap();
        let report = DuplicateFinder::with_config(config).find(temp.path()).unwrap();
        assert!(!report.has_duplicates());
        assert_eq!(report.files_analyzed, 0);
    }

    #[test]
    fn test_config_rejects_inverted_bounds() {
        let err = DuplicateConfig::builder()
            .min_size(10u64)
            .max_size(5u64)
            .build()
            .unwrap_err();
        assert!(matches!(err, TidyError::Validation { .. }));
    }

    #[test]
    fn test_unreadable_record_is_skipped() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::write(&a, "xx").unwrap();
        fs::write(&b, "xx").unwrap();
        let now = std::time::SystemTime::now();

        let records = vec![
            FileRecord::file(&a, 2, now),
            FileRecord::file(temp.path().join("vanished"), 2, now),
            FileRecord::file(&b, 2, now),
        ];
        let index = DuplicateIndex::build(records);

        assert_eq!(index.len(), 1);
        assert_eq!(index.skipped().len(), 1);
        assert!(index.skipped()[0].path.ends_with("vanished"));
    }
}
