//! In-memory string de-duplication.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use tidytree_core::TidyError;

use crate::hasher::hash_bytes;

/// Default similarity threshold for fuzzy matching.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static LEADING_ARTICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(the|a|an)\s+").expect("valid regex"));
static TRAILING_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(inc|corp|llc|ltd)$").expect("valid regex"));

/// How two strings are judged equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DedupStrategy {
    /// Byte-for-byte equality.
    #[default]
    Exact,
    /// Edit-distance similarity at or above a threshold.
    Fuzzy,
    /// Equality after normalization.
    Semantic,
    /// Equality of content fingerprints.
    HashBased,
}

impl DedupStrategy {
    /// Parse a strategy name.
    pub fn from_name(name: &str) -> Result<Self, TidyError> {
        name.parse().map_err(|_| TidyError::UnknownStrategy {
            name: name.to_string(),
        })
    }
}

/// Drop duplicates, keeping the first occurrence of each.
///
/// `threshold` is used only by [`DedupStrategy::Fuzzy`].
pub fn dedup_strings<'a, S: AsRef<str>>(
    items: &'a [S],
    strategy: DedupStrategy,
    threshold: f64,
) -> Vec<&'a str> {
    let items = items.iter().map(AsRef::as_ref);
    match strategy {
        DedupStrategy::Exact => {
            let mut seen = HashSet::new();
            items.filter(|item| seen.insert(*item)).collect()
        }
        DedupStrategy::Fuzzy => {
            let mut kept: Vec<&str> = Vec::new();
            for item in items {
                if !kept.iter().any(|k| similarity(item, k) >= threshold) {
                    kept.push(item);
                }
            }
            kept
        }
        DedupStrategy::Semantic => {
            let mut seen = HashSet::new();
            items.filter(|item| seen.insert(normalize(item))).collect()
        }
        DedupStrategy::HashBased => {
            let mut seen = HashSet::new();
            items
                .filter(|item| seen.insert(hash_bytes(item.as_bytes())))
                .collect()
        }
    }
}

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `(len(longer) - distance) / len(longer)`; two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    (longest - levenshtein(a, b)) as f64 / longest as f64
}

/// Lowercase, collapse whitespace, drop punctuation, a leading article and a
/// trailing company suffix.
pub fn normalize(text: &str) -> String {
    let text = text.to_lowercase();
    let text = WHITESPACE.replace_all(&text, " ");
    let text = PUNCTUATION.replace_all(text.trim(), "");
    let text = LEADING_ARTICLE.replace(text.trim(), "");
    let text = TRAILING_SUFFIX.replace(text.trim(), "");
    text.trim().to_string()
}
