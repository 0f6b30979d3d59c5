//! Serial jwalk-based tree scanner.

use std::path::{Path, PathBuf};

use jwalk::{DirEntryIter, Parallelism, WalkDir};
use tracing::{debug, warn};

use tidytree_core::{FileRecord, PathMatcher, ScanConfig, ScanWarning, TidyError, WarningKind};

/// Walks a directory tree and produces file records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeScanner;

impl TreeScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self
    }

    /// Start a scan. Fails only if the root itself cannot be used.
    pub fn scan(&self, config: &ScanConfig) -> Result<Scan, TidyError> {
        let root = config
            .root
            .canonicalize()
            .map_err(|e| TidyError::io(&config.root, e))?;
        if !root.is_dir() {
            return Err(TidyError::NotADirectory { path: root });
        }

        let pattern = config.pattern_matcher()?;
        let ignore = config.ignore_set()?;

        let mut walker = WalkDir::new(&root)
            .parallelism(Parallelism::Serial)
            .sort(true)
            .skip_hidden(!config.include_hidden)
            .follow_links(false)
            .min_depth(1)
            .max_depth(config.max_depth.map(|d| d as usize).unwrap_or(usize::MAX));

        if !ignore.is_empty() {
            walker = walker.process_read_dir(move |_depth, _path, _state, children| {
                children.retain(|child| match child {
                    Ok(entry) => !ignore.is_match(&entry.file_name),
                    Err(_) => true,
                });
            });
        }

        debug!(root = %root.display(), "starting scan");

        Ok(Scan {
            root,
            entries: walker.into_iter(),
            pattern,
            include_dirs: config.include_dirs,
            warnings: Vec::new(),
        })
    }

    /// Run a scan to completion.
    pub fn collect(&self, config: &ScanConfig) -> Result<(Vec<FileRecord>, Vec<ScanWarning>), TidyError> {
        let mut scan = self.scan(config)?;
        let records: Vec<FileRecord> = scan.by_ref().collect();
        Ok((records, scan.into_warnings()))
    }
}

/// A scan in progress. Yields records lazily in walk order.
pub struct Scan {
    root: PathBuf,
    entries: DirEntryIter<((), ())>,
    pattern: Option<PathMatcher>,
    include_dirs: bool,
    warnings: Vec<ScanWarning>,
}

impl Scan {
    /// Canonical root of the walk.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries that could not be read so far.
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ScanWarning> {
        self.warnings
    }

    fn push_warning(&mut self, warning: ScanWarning) {
        warn!(path = %warning.path.display(), "{}", warning.message);
        self.warnings.push(warning);
    }
}

impl Iterator for Scan {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    self.push_warning(walk_warning(&err, path, WarningKind::ReadError));
                    continue;
                }
            };

            // Unreadable directories still come through; only their children are lost
            if let Some(err) = &entry.read_children_error {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| entry.path());
                self.push_warning(walk_warning(err, path, WarningKind::ReadError));
            }

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() && !self.include_dirs {
                continue;
            }
            if !file_type.is_dir() && !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            if let Some(pattern) = &self.pattern {
                if !pattern.is_match(&path, &self.root) {
                    continue;
                }
            }

            match entry.metadata() {
                Ok(metadata) => return Some(FileRecord::from_metadata(path, &metadata)),
                Err(err) => self.push_warning(walk_warning(&err, path, WarningKind::MetadataError)),
            }
        }
    }
}

fn walk_warning(err: &jwalk::Error, path: PathBuf, kind: WarningKind) -> ScanWarning {
    match err.io_error() {
        Some(io) => ScanWarning::from_io(path, io, kind),
        None => ScanWarning::new(path, err.to_string(), kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.log"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), "another file here").unwrap();
        fs::write(root.join(".hidden"), "h").unwrap();

        temp
    }

    fn names(records: &[FileRecord]) -> Vec<String> {
        records.iter().map(FileRecord::name).collect()
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let (records, warnings) = TreeScanner::new()
            .collect(&ScanConfig::new(temp.path()))
            .unwrap();

        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| !r.is_dir));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_include_dirs() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .include_dirs(true)
            .build()
            .unwrap();
        let (records, _) = TreeScanner::new().collect(&config).unwrap();

        assert_eq!(records.iter().filter(|r| r.is_dir).count(), 3);
        assert!(!records.iter().any(|r| r.path == temp.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_pattern_on_name() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .pattern("*.txt")
            .build()
            .unwrap();
        let (records, _) = TreeScanner::new().collect(&config).unwrap();

        let mut found = names(&records);
        found.sort();
        assert_eq!(found, vec!["file1.txt", "file2.txt", "file4.txt"]);
    }

    #[test]
    fn test_pattern_on_relative_path() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .pattern("dir1/*.txt")
            .build()
            .unwrap();
        let (records, _) = TreeScanner::new().collect(&config).unwrap();
        assert_eq!(names(&records), vec!["file2.txt"]);
    }

    #[test]
    fn test_ignore_prunes_directory() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .ignore_patterns(vec!["dir1".to_string()])
            .build()
            .unwrap();
        let (records, _) = TreeScanner::new().collect(&config).unwrap();

        assert!(records.iter().all(|r| !r.path.to_string_lossy().contains("dir1")));
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_skip_hidden() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .include_hidden(false)
            .build()
            .unwrap();
        let (records, _) = TreeScanner::new().collect(&config).unwrap();
        assert!(!names(&records).contains(&".hidden".to_string()));
    }

    #[test]
    fn test_max_depth() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .max_depth(Some(1))
            .build()
            .unwrap();
        let (records, _) = TreeScanner::new().collect(&config).unwrap();
        let mut found = names(&records);
        found.sort();
        assert_eq!(found, vec![".hidden", "file1.txt"]);
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = TreeScanner::new().scan(&ScanConfig::new(temp.path().join("nope")));
        assert!(matches!(result, Err(TidyError::NotFound { .. })));
    }

    #[test]
    fn test_root_is_file() {
        let temp = create_test_tree();
        let result = TreeScanner::new().scan(&ScanConfig::new(temp.path().join("file1.txt")));
        assert!(matches!(result, Err(TidyError::NotADirectory { .. })));
    }
}
