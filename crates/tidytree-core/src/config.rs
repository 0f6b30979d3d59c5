//! Scan configuration types.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::TidyError;

/// Configuration for a tree scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate", error = "TidyError"))]
pub struct ScanConfig {
    /// Root directory to scan.
    pub root: PathBuf,

    /// Inclusion glob. Matched against the file name, or against the path
    /// relative to the root when it contains a `/`.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub pattern: Option<String>,

    /// Yield directories as well as regular files.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_dirs: bool,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Maximum depth to traverse (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Entry names to prune from the walk (glob syntax).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), TidyError> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err(TidyError::validation("Root path cannot be empty"));
            }
            None => return Err(TidyError::validation("Root path is required")),
            _ => {}
        }
        if let Some(Some(pattern)) = &self.pattern {
            compile_glob(pattern)?;
        }
        if let Some(patterns) = &self.ignore_patterns {
            for pattern in patterns {
                compile_glob(pattern)?;
            }
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: None,
            include_dirs: false,
            include_hidden: true,
            max_depth: None,
            ignore_patterns: Vec::new(),
        }
    }

    /// Compile the inclusion pattern, if any.
    pub fn pattern_matcher(&self) -> Result<Option<PathMatcher>, TidyError> {
        self.pattern.as_deref().map(PathMatcher::new).transpose()
    }

    /// Compile the ignore patterns into one set.
    pub fn ignore_set(&self) -> Result<GlobSet, TidyError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_patterns {
            let glob = Glob::new(pattern).map_err(|e| TidyError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| TidyError::InvalidPattern {
            pattern: self.ignore_patterns.join(","),
            message: e.to_string(),
        })
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Compile a glob with `*` not crossing directory separators.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher, TidyError> {
    if pattern.is_empty() {
        return Err(TidyError::InvalidPattern {
            pattern: pattern.to_string(),
            message: "pattern is empty".to_string(),
        });
    }
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| TidyError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// A compiled glob that knows whether it targets names or relative paths.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: String,
    matcher: GlobMatcher,
    match_path: bool,
}

impl PathMatcher {
    /// Compile a pattern.
    pub fn new(pattern: &str) -> Result<Self, TidyError> {
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: compile_glob(pattern)?,
            match_path: pattern.contains('/'),
        })
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check `path`, taken relative to `root` for path patterns.
    pub fn is_match(&self, path: &Path, root: &Path) -> bool {
        if self.match_path {
            let relative = path.strip_prefix(root).unwrap_or(path);
            self.matcher.is_match(relative)
        } else {
            path.file_name()
                .map(|name| self.matcher.is_match(Path::new(name)))
                .unwrap_or(false)
        }
    }
}
