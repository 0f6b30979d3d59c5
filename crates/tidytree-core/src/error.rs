//! Error and warning types shared by every tidytree crate.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by scanning, hashing, rule construction and file actions.
#[derive(Debug, Error)]
pub enum TidyError {
    /// A rule or configuration value is malformed.
    #[error("Invalid rule: {message}")]
    Validation { message: String },

    /// A glob pattern failed to compile.
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A destination template uses an unknown slot or is malformed.
    #[error("Invalid destination template '{template}': {message}")]
    InvalidTemplate { template: String, message: String },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No free disambiguated name was found for a destination.
    #[error("No free name for {path} after {attempts} attempts")]
    ConflictResolutionExhausted { path: PathBuf, attempts: u32 },

    /// A strategy name did not match any known strategy.
    #[error("Unknown strategy: {name}")]
    UnknownStrategy { name: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Invalid settings file or option.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A process could not be signalled.
    #[error("Process {pid}: {message}")]
    Process { pid: u32, message: String },
}

impl TidyError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether this is a per-entry filesystem failure.
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::NotFound { .. } | Self::Io { .. }
        )
    }

    /// Whether the error means the path does not exist (anymore).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<derive_builder::UninitializedFieldError> for TidyError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::validation(format!("Missing required field: {}", err.field_name()))
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading a directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// Error hashing a file.
    HashError,
}

/// Non-fatal warning encountered during a scan or index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning from an I/O error, classifying permission failures.
    pub fn from_io(path: impl Into<PathBuf>, error: &std::io::Error, kind: WarningKind) -> Self {
        let path = path.into();
        let kind = if error.kind() == std::io::ErrorKind::PermissionDenied {
            WarningKind::PermissionDenied
        } else {
            kind
        };
        Self {
            message: error.to_string(),
            path,
            kind,
        }
    }

    /// Create a warning for a file that could not be hashed.
    pub fn hash_failed(path: impl Into<PathBuf>, error: &TidyError) -> Self {
        Self {
            path: path.into(),
            message: error.to_string(),
            kind: WarningKind::HashError,
        }
    }
}

impl std::fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tidy_error_io() {
        let err = TidyError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, TidyError::PermissionDenied { .. }));
        assert!(err.is_io_failure());

        let err = TidyError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());

        let err = TidyError::io("/test/path", std::io::Error::other("device"));
        assert!(matches!(err, TidyError::Io { .. }));
    }

    #[test]
    fn test_validation_is_not_io() {
        let err = TidyError::validation("Missing required field: name");
        assert!(!err.is_io_failure());
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_warning_from_io_permission() {
        let error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let warning = ScanWarning::from_io("/x", &error, WarningKind::ReadError);
        assert_eq!(warning.kind, WarningKind::PermissionDenied);

        let error = std::io::Error::other("bad sector");
        let warning = ScanWarning::from_io("/x", &error, WarningKind::MetadataError);
        assert_eq!(warning.kind, WarningKind::MetadataError);
    }
}
