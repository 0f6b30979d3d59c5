//! User settings file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TidyError;
use crate::policy::KeepPolicy;
use crate::rule::{CleanupRuleSpec, OrganizationRuleSpec};

/// Category used when no extension list matches.
pub const FALLBACK_CATEGORY: &str = "others";

/// Settings loaded from `config.toml`. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder name (under the scanned root) that receives duplicates.
    pub duplicates_dir: String,
    /// Which duplicate survives.
    pub keep: KeepPolicy,
    /// Send deleted entries to the platform trash.
    pub use_trash: bool,
    /// Operation history capacity.
    pub history_capacity: usize,
    /// Seconds between maintenance runs in `watch`.
    pub maintenance_interval_secs: u64,
    /// chrono format for date-based organization.
    pub date_format: String,
    /// Register the stock temp/cache/log rules.
    pub use_default_rules: bool,
    pub cleanup_rules: Vec<CleanupRuleSpec>,
    pub organization_rules: Vec<OrganizationRuleSpec>,
    /// Category folder name to extension list (lowercase, no dot).
    pub categories: BTreeMap<String, Vec<String>>,
    /// Size folder name to the smallest file size (bytes) it takes.
    pub size_buckets: BTreeMap<String, u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            duplicates_dir: "_duplicates".to_string(),
            keep: KeepPolicy::KeepFirst,
            use_trash: false,
            history_capacity: 1000,
            maintenance_interval_secs: 300,
            date_format: "%Y/%m".to_string(),
            use_default_rules: true,
            cleanup_rules: Vec::new(),
            organization_rules: Vec::new(),
            categories: default_categories(),
            size_buckets: default_size_buckets(),
        }
    }
}

fn default_categories() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 7] = [
        ("images", &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "svg", "webp"]),
        (
            "documents",
            &["pdf", "doc", "docx", "txt", "rtf", "odt", "xls", "xlsx", "ppt", "pptx"],
        ),
        ("videos", &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"]),
        ("audio", &["mp3", "wav", "flac", "aac", "ogg", "wma"]),
        ("archives", &["zip", "rar", "7z", "tar", "gz", "bz2"]),
        (
            "code",
            &["py", "js", "html", "css", "java", "cpp", "c", "php", "rb", "go", "rs"],
        ),
        ("applications", &["exe", "msi", "dmg", "app", "deb", "rpm"]),
    ];
    table
        .into_iter()
        .map(|(name, exts)| {
            (
                name.to_string(),
                exts.iter().map(|e| e.to_string()).collect(),
            )
        })
        .collect()
}

fn default_size_buckets() -> BTreeMap<String, u64> {
    [
        ("small", 0),
        ("medium", 1024 * 1024),
        ("large", 100 * 1024 * 1024),
        ("xlarge", 1024 * 1024 * 1024),
    ]
    .into_iter()
    .map(|(name, min)| (name.to_string(), min))
    .collect()
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tidytree").join("config.toml"))
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, TidyError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(TidyError::io(path, e)),
        };
        Self::from_toml(&content).map_err(|e| match e {
            TidyError::InvalidConfig { message } => TidyError::InvalidConfig {
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        })
    }

    /// Load from the default location, or defaults when there is none.
    pub fn load_default() -> Result<Self, TidyError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, TidyError> {
        let settings: Self = toml::from_str(content).map_err(|e| TidyError::InvalidConfig {
            message: e.to_string(),
        })?;
        settings.check()?;
        Ok(settings)
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), TidyError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TidyError::io(parent, e))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| TidyError::InvalidConfig {
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| TidyError::io(path, e))
    }

    fn check(&self) -> Result<(), TidyError> {
        if self.duplicates_dir.is_empty() || self.duplicates_dir.contains(['/', '\\']) {
            return Err(TidyError::InvalidConfig {
                message: format!("duplicates_dir must be a plain folder name, got '{}'", self.duplicates_dir),
            });
        }
        if self.size_buckets.is_empty() {
            return Err(TidyError::InvalidConfig {
                message: "size_buckets must name at least one folder".to_string(),
            });
        }
        if let Some(name) = self
            .size_buckets
            .keys()
            .find(|name| name.is_empty() || name.contains(['/', '\\']))
        {
            return Err(TidyError::InvalidConfig {
                message: format!("size bucket must be a plain folder name, got '{name}'"),
            });
        }
        if self.history_capacity == 0 {
            return Err(TidyError::InvalidConfig {
                message: "history_capacity must be at least 1".to_string(),
            });
        }
        if self.maintenance_interval_secs == 0 {
            return Err(TidyError::InvalidConfig {
                message: "maintenance_interval_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Category folder for an extension (case-insensitive, no dot).
    pub fn category_for(&self, ext: &str) -> &str {
        category_for(&self.categories, ext)
    }

    /// Size folder for a file of `size` bytes.
    pub fn size_bucket_for(&self, size: u64) -> Option<&str> {
        size_bucket_for(&self.size_buckets, size)
    }
}

/// The bucket with the largest minimum not above `size`. Sizes below every
/// minimum fall into the smallest bucket; `None` only for an empty table.
pub fn size_bucket_for(buckets: &BTreeMap<String, u64>, size: u64) -> Option<&str> {
    buckets
        .iter()
        .filter(|(_, min)| size >= **min)
        .max_by_key(|(_, min)| **min)
        .or_else(|| buckets.iter().min_by_key(|(_, min)| **min))
        .map(|(name, _)| name.as_str())
}

/// Look up the category folder for an extension in a category table.
pub fn category_for<'a>(categories: &'a BTreeMap<String, Vec<String>>, ext: &str) -> &'a str {
    let ext = ext.trim_start_matches('.');
    if ext.is_empty() {
        return FALLBACK_CATEGORY;
    }
    categories
        .iter()
        .find(|(_, exts)| {
            exts.iter()
                .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .map(|(name, _)| name.as_str())
        .unwrap_or(FALLBACK_CATEGORY)
}
