//! Duplicate analysis for tidytree.
//!
//! - **Hashing** - streaming BLAKE3 fingerprints of file content
//! - **Duplicate index** - files grouped into equivalence classes by fingerprint
//! - **Retention** - which member of a class is kept
//! - **String strategies** - exact, fuzzy, semantic and hash-based
//!   de-duplication of in-memory strings
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tidytree_analyze::{DuplicateFinder, KeepPolicy, partition};
//!
//! let (index, _) = DuplicateFinder::new().index(Path::new("/photos")).unwrap();
//! for (fingerprint, class) in index.classes() {
//!     let retention = partition(class, KeepPolicy::KeepFirst).unwrap();
//!     println!("{fingerprint}: keep {}", retention.kept.path.display());
//! }
//! ```

mod duplicates;
mod hasher;
mod retention;
mod strategy;

pub use duplicates::{
    DuplicateConfig, DuplicateConfigBuilder, DuplicateFinder, DuplicateGroup, DuplicateIndex,
    DuplicateReport,
};
pub use hasher::{hash_bytes, hash_file};
pub use retention::{Retention, partition};
pub use strategy::{DEFAULT_THRESHOLD, DedupStrategy, dedup_strings, levenshtein, normalize, similarity};

// Re-export core types
pub use tidytree_core::{FileRecord, Fingerprint, KeepPolicy};
