//! Conflict-safe delete, move and directory creation.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use tidytree_core::TidyError;

/// Upper bound on the `stem_N.ext` suffix search.
pub const MAX_RENAME_ATTEMPTS: u32 = 10_000;

/// Performs single-entry filesystem actions.
///
/// Every method acts on one entry and returns its error to the caller, which
/// records it and moves on to the next entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionExecutor {
    /// Compute results without touching the filesystem.
    pub dry_run: bool,
    /// Send deleted entries to the platform trash.
    pub use_trash: bool,
}

impl ActionExecutor {
    /// Create an executor that performs real, permanent actions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set trash mode for deletions.
    pub fn with_trash(mut self, use_trash: bool) -> Self {
        self.use_trash = use_trash;
        self
    }

    /// Remove a file or directory tree; returns the bytes freed.
    pub fn delete(&self, path: &Path) -> Result<u64, TidyError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| TidyError::io(path, e))?;
        let size = if metadata.is_dir() {
            dir_size(path)
        } else {
            metadata.len()
        };

        if self.dry_run {
            debug!(path = %path.display(), size, "would delete");
            return Ok(size);
        }

        if self.use_trash {
            trash::delete(path).map_err(|e| TidyError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })?;
        } else if metadata.is_dir() {
            fs::remove_dir_all(path).map_err(|e| TidyError::io(path, e))?;
        } else {
            fs::remove_file(path).map_err(|e| TidyError::io(path, e))?;
        }

        debug!(path = %path.display(), size, trash = self.use_trash, "deleted");
        Ok(size)
    }

    /// Move an entry into `dest_dir` under a free name; returns the final path.
    pub fn move_to(&self, path: &Path, dest_dir: &Path) -> Result<PathBuf, TidyError> {
        self.move_to_reserving(path, dest_dir, &mut HashSet::new())
    }

    /// Like [`move_to`](Self::move_to), but also avoids every path in
    /// `reserved` and adds the chosen target to it.
    ///
    /// Callers share one set across a batch so that a dry run plans the same
    /// targets a real run would produce. An entry already directly inside
    /// `dest_dir` is left where it is and its own path is returned.
    pub fn move_to_reserving(
        &self,
        path: &Path,
        dest_dir: &Path,
        reserved: &mut HashSet<PathBuf>,
    ) -> Result<PathBuf, TidyError> {
        let name = path
            .file_name()
            .ok_or_else(|| TidyError::validation(format!("{} has no file name", path.display())))?;
        let metadata = fs::symlink_metadata(path).map_err(|e| TidyError::io(path, e))?;

        if is_directly_inside(path, dest_dir) {
            debug!(path = %path.display(), "already in destination");
            return Ok(path.to_path_buf());
        }

        if self.dry_run {
            let target = free_destination_name_excluding(dest_dir, name, reserved)?;
            reserved.insert(target.clone());
            debug!(from = %path.display(), to = %target.display(), "would move");
            return Ok(target);
        }

        fs::create_dir_all(dest_dir).map_err(|e| TidyError::io(dest_dir, e))?;
        let target = claim_destination(dest_dir, name, metadata.is_dir(), reserved)?;
        if let Err(e) = move_entry(path, &target) {
            release_claim(&target, metadata.is_dir());
            return Err(e);
        }

        debug!(from = %path.display(), to = %target.display(), "moved");
        Ok(target)
    }

    /// Create a directory tree. Returns whether anything was (or would be) created.
    pub fn ensure_dir(&self, path: &Path) -> Result<bool, TidyError> {
        if path.is_dir() {
            return Ok(false);
        }
        if !self.dry_run {
            fs::create_dir_all(path).map_err(|e| TidyError::io(path, e))?;
            debug!(path = %path.display(), "created directory");
        }
        Ok(true)
    }
}

/// First name in `dir` that is not taken: `name`, then `stem_1.ext`,
/// `stem_2.ext` and so on.
pub fn free_destination_name(dir: &Path, name: &OsStr) -> Result<PathBuf, TidyError> {
    free_destination_name_excluding(dir, name, &HashSet::new())
}

/// [`free_destination_name`] that also treats every path in `taken` as occupied.
pub fn free_destination_name_excluding(
    dir: &Path,
    name: &OsStr,
    taken: &HashSet<PathBuf>,
) -> Result<PathBuf, TidyError> {
    let is_free = |path: &Path| !taken.contains(path) && !exists(path);

    let candidate = dir.join(name);
    if is_free(&candidate) {
        return Ok(candidate);
    }

    let name_path = Path::new(name);
    let stem = name_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = name_path.extension().map(|e| e.to_string_lossy().to_string());

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match &extension {
            Some(ext) => format!("{stem}_{i}.{ext}"),
            None => format!("{stem}_{i}"),
        };
        let new_path = dir.join(new_name);
        if is_free(&new_path) {
            return Ok(new_path);
        }
    }

    Err(TidyError::ConflictResolutionExhausted {
        path: candidate,
        attempts: MAX_RENAME_ATTEMPTS,
    })
}

/// Atomically create a placeholder at the first free name. The rename that
/// follows replaces only that placeholder.
fn claim_destination(
    dir: &Path,
    name: &OsStr,
    is_dir: bool,
    reserved: &mut HashSet<PathBuf>,
) -> Result<PathBuf, TidyError> {
    loop {
        let target = free_destination_name_excluding(dir, name, reserved)?;
        reserved.insert(target.clone());

        let claimed = if is_dir {
            fs::create_dir(&target)
        } else {
            fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .map(drop)
        };
        match claimed {
            Ok(()) => return Ok(target),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %target.display(), "destination appeared, trying next name");
            }
            Err(e) => return Err(TidyError::io(&target, e)),
        }
    }
}

fn release_claim(target: &Path, is_dir: bool) {
    let removed = if is_dir {
        fs::remove_dir(target)
    } else {
        fs::remove_file(target)
    };
    if let Err(e) = removed {
        warn!(path = %target.display(), error = %e, "could not remove destination placeholder");
    }
}

fn is_directly_inside(path: &Path, dir: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return false;
    };
    if parent == dir {
        return true;
    }
    match (parent.canonicalize(), dir.canonicalize()) {
        (Ok(parent), Ok(dir)) => parent == dir,
        _ => false,
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Rename, falling back to copy + remove across filesystems.
fn move_entry(source: &Path, dest: &Path) -> Result<(), TidyError> {
    match fs::rename(source, dest) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {}
        Err(e) => return Err(TidyError::io(source, e)),
    }

    if source.is_dir() {
        copy_dir_recursive(source, dest)?;
        fs::remove_dir_all(source).map_err(|e| TidyError::io(source, e))?;
    } else {
        fs::copy(source, dest).map_err(|e| TidyError::io(source, e))?;
        fs::remove_file(source).map_err(|e| TidyError::io(source, e))?;
    }
    Ok(())
}

fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<(), TidyError> {
    fs::create_dir_all(dest).map_err(|e| TidyError::io(dest, e))?;

    for entry in fs::read_dir(source).map_err(|e| TidyError::io(source, e))? {
        let entry = entry.map_err(|e| TidyError::io(source, e))?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path).map_err(|e| TidyError::io(&path, e))?;
        }
    }
    Ok(())
}

/// Total size of regular files below `dir`, not following symlinks.
pub fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| match entry.path().symlink_metadata() {
            Ok(m) if m.is_dir() => dir_size(&entry.path()),
            Ok(m) => m.len(),
            Err(_) => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_free_name_suffixes() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        assert_eq!(
            free_destination_name(dir, OsStr::new("a.txt")).unwrap(),
            dir.join("a.txt")
        );

        fs::write(dir.join("a.txt"), "1").unwrap();
        fs::write(dir.join("a_1.txt"), "2").unwrap();
        assert_eq!(
            free_destination_name(dir, OsStr::new("a.txt")).unwrap(),
            dir.join("a_2.txt")
        );

        fs::write(dir.join("Makefile"), "").unwrap();
        assert_eq!(
            free_destination_name(dir, OsStr::new("Makefile")).unwrap(),
            dir.join("Makefile_1")
        );
    }

    #[test]
    fn test_free_name_skips_taken() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let taken: HashSet<PathBuf> = [dir.join("a.txt"), dir.join("a_1.txt")].into();

        assert_eq!(
            free_destination_name_excluding(dir, OsStr::new("a.txt"), &taken).unwrap(),
            dir.join("a_2.txt")
        );
    }

    #[test]
    fn test_free_name_exhausted() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let mut taken: HashSet<PathBuf> = (1..=MAX_RENAME_ATTEMPTS)
            .map(|i| dir.join(format!("a_{i}.txt")))
            .collect();
        taken.insert(dir.join("a.txt"));

        let err = free_destination_name_excluding(dir, OsStr::new("a.txt"), &taken).unwrap_err();
        match err {
            TidyError::ConflictResolutionExhausted { path, attempts } => {
                assert_eq!(path, dir.join("a.txt"));
                assert_eq!(attempts, MAX_RENAME_ATTEMPTS);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_move_into_own_parent_is_noop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.log");
        fs::write(&path, "x").unwrap();

        let target = ActionExecutor::new().move_to(&path, temp.path()).unwrap();
        assert_eq!(target, path);
        assert!(path.exists());
        assert!(!temp.path().join("a_1.log").exists());
    }

    #[test]
    fn test_move_reserving_avoids_reserved_names() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), "x").unwrap();

        let mut reserved: HashSet<PathBuf> = [dest.join("a.txt")].into();
        let target = ActionExecutor::new()
            .move_to_reserving(&src.join("a.txt"), &dest, &mut reserved)
            .unwrap();

        assert_eq!(target, dest.join("a_1.txt"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "x");
        assert!(!dest.join("a.txt").exists());
        assert!(reserved.contains(&target));
    }

    #[test]
    fn test_dry_run_reserves_planned_names() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("archive");
        for dir in ["one", "two"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
            fs::write(temp.path().join(dir).join("a.log"), dir).unwrap();
        }

        let plan = |executor: ActionExecutor| {
            let mut reserved = HashSet::new();
            ["one", "two"]
                .iter()
                .map(|dir| {
                    executor
                        .move_to_reserving(&temp.path().join(dir).join("a.log"), &dest, &mut reserved)
                        .unwrap()
                })
                .collect::<Vec<_>>()
        };

        let planned = plan(ActionExecutor::new().with_dry_run(true));
        let moved = plan(ActionExecutor::new());
        assert_eq!(planned, moved);
        assert_eq!(moved, vec![dest.join("a.log"), dest.join("a_1.log")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_move_releases_placeholder() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs");
        fs::create_dir_all(&dir).unwrap();
        let inner = dir.join("archive");

        let err = ActionExecutor::new().move_to(&dir, &inner).unwrap_err();
        assert!(matches!(err, TidyError::Io { .. }));
        assert!(dir.is_dir());
        assert!(!inner.join("logs").exists());
    }

    #[test]
    fn test_delete_file_returns_size() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f.bin");
        fs::write(&path, [0u8; 42]).unwrap();

        assert_eq!(ActionExecutor::new().delete(&path).unwrap(), 42);
        assert!(!path.exists());
    }

    #[test]
    fn test_delete_directory_tree() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tree");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("a"), "12345").unwrap();
        fs::write(dir.join("nested/b"), "123").unwrap();

        assert_eq!(ActionExecutor::new().delete(&dir).unwrap(), 8);
        assert!(!dir.exists());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keep.txt");
        fs::write(&path, "abc").unwrap();
        let executor = ActionExecutor::new().with_dry_run(true);

        assert_eq!(executor.delete(&path).unwrap(), 3);
        assert!(path.exists());

        let dest = temp.path().join("new_dir");
        assert_eq!(executor.move_to(&path, &dest).unwrap(), dest.join("keep.txt"));
        assert!(path.exists());
        assert!(!dest.exists());

        assert!(executor.ensure_dir(&dest).unwrap());
        assert!(!dest.exists());
    }

    #[test]
    fn test_missing_source() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone");
        let executor = ActionExecutor::new();

        assert!(executor.delete(&missing).unwrap_err().is_not_found());
        assert!(executor.move_to(&missing, temp.path()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_ensure_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("x/y");
        let executor = ActionExecutor::new();
        assert!(executor.ensure_dir(&dir).unwrap());
        assert!(dir.is_dir());
        assert!(!executor.ensure_dir(&dir).unwrap());
    }
}
