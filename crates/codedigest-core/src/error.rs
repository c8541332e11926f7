//! Error and warning types shared by every pipeline stage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Systemic failures. When one of these is returned no digest is produced.
#[derive(Debug, Error)]
pub enum DigestError {
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

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A glob or ignore pattern could not be compiled.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Inputs handed to a stage do not line up.
    #[error("Inconsistent input: {message}")]
    InconsistentInput { message: String },

    /// Serialization of the artifact failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DigestError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a pattern compilation error.
    pub fn pattern(pattern: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }
}

/// Kind of non-fatal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading a directory entry.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// An ignore file could not be read or contained bad rules.
    IgnoreFile,
    /// A size, count or depth ceiling was reached.
    LimitExceeded,
    /// A directory was not descended into.
    DirectoryPruned,
    /// A symbolic link was recorded but not followed.
    Symlink,
    /// Content extraction for one file failed.
    Extraction,
    /// A redaction pattern was degraded.
    Redaction,
    /// The run was cancelled before completion.
    Cancelled,
}

/// Non-fatal warning encountered during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestWarning {
    /// Path where the warning occurred (may be empty for run-level warnings).
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl DigestWarning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }

    /// Create a read error warning.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::permission_denied(path);
        }
        Self {
            message: format!("Read error: {error}"),
            path: path.into(),
            kind: WarningKind::ReadError,
        }
    }

    /// Create a limit warning. Only the first hit of each limit is reported.
    pub fn limit(message: impl Into<String>) -> Self {
        Self::new(PathBuf::new(), message, WarningKind::LimitExceeded)
    }

    /// Create a per-file extraction warning.
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(path, message, WarningKind::Extraction)
    }

    /// Create a cancellation warning.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(PathBuf::new(), message, WarningKind::Cancelled)
    }
}
