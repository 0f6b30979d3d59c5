//! Which member of a duplicate class survives.

use tidytree_core::{FileRecord, KeepPolicy};

/// Split of one equivalence class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retention<'a> {
    /// The survivor.
    pub kept: &'a FileRecord,
    /// Everything else, in discovery order.
    pub candidates: Vec<&'a FileRecord>,
}

/// Partition a class into the kept record and removal candidates.
///
/// Returns `None` for an empty class. A single-member class keeps its only
/// member and has no candidates.
pub fn partition(class: &[FileRecord], keep: KeepPolicy) -> Option<Retention<'_>> {
    let (kept, rest) = match keep {
        KeepPolicy::KeepFirst => {
            let (first, rest) = class.split_first()?;
            (first, rest)
        }
        KeepPolicy::KeepLast => {
            let (last, rest) = class.split_last()?;
            (last, rest)
        }
    };
    Some(Retention {
        kept,
        candidates: rest.iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn class() -> Vec<FileRecord> {
        let now = SystemTime::now();
        ["/a", "/b", "/c"]
            .into_iter()
            .map(|p| FileRecord::file(p, 1, now))
            .collect()
    }

    #[test]
    fn test_keep_first() {
        let class = class();
        let retention = partition(&class, KeepPolicy::KeepFirst).unwrap();
        assert_eq!(retention.kept.path.to_str(), Some("/a"));
        let rest: Vec<_> = retention.candidates.iter().map(|r| r.name()).collect();
        assert_eq!(rest, vec!["b", "c"]);
    }

    #[test]
    fn test_keep_last() {
        let class = class();
        let retention = partition(&class, KeepPolicy::KeepLast).unwrap();
        assert_eq!(retention.kept.path.to_str(), Some("/c"));
        let rest: Vec<_> = retention.candidates.iter().map(|r| r.name()).collect();
        assert_eq!(rest, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_and_single() {
        assert!(partition(&[], KeepPolicy::KeepFirst).is_none());

        let one = vec![FileRecord::file("/only", 1, SystemTime::now())];
        let retention = partition(&one, KeepPolicy::KeepLast).unwrap();
        assert!(retention.candidates.is_empty());
    }
}
