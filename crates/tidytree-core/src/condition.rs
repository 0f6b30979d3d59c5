//! Age, size and emptiness predicates shared by cleanup and organization rules.

use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::record::FileRecord;

/// Conjunction of optional bounds. An absent bound always passes.
///
/// Ages are in seconds relative to one evaluation-time `now`. Size bounds
/// apply only to regular files; a directory passes them vacuously.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    /// Minimum age in seconds.
    pub age_min: Option<u64>,
    /// Maximum age in seconds.
    pub age_max: Option<u64>,
    /// Minimum size in bytes.
    pub size_min: Option<u64>,
    /// Maximum size in bytes.
    pub size_max: Option<u64>,
    /// Require an empty directory.
    pub empty: bool,
}

impl Condition {
    /// A condition that matches everything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Require at least `secs` seconds since modification.
    pub fn older_than(secs: u64) -> Self {
        Self {
            age_min: Some(secs),
            ..Self::default()
        }
    }

    /// Whether no bound is set.
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    /// Evaluate against a record at `now`.
    pub fn matches(&self, record: &FileRecord, now: SystemTime) -> bool {
        let age = record.age(now).as_secs();
        if self.age_min.is_some_and(|min| age < min) {
            return false;
        }
        if self.age_max.is_some_and(|max| age > max) {
            return false;
        }

        if !record.is_dir {
            if self.size_min.is_some_and(|min| record.size < min) {
                return false;
            }
            if self.size_max.is_some_and(|max| record.size > max) {
                return false;
            }
        }

        if self.empty {
            return record.is_dir && is_empty_dir(&record.path);
        }
        true
    }
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
