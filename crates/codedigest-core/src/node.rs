//! File descriptors emitted by traversal.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::language::language_name;

/// Type of file system node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (never followed).
    Symlink,
}

/// A single path produced by the traversal engine.
///
/// Descriptors are immutable once emitted and carry no selection state;
/// selection belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Absolute path on disk.
    pub path: PathBuf,

    /// Path relative to the scan root, `/` separated.
    pub relative_path: CompactString,

    /// Size in bytes (0 for directories and symlinks).
    pub size: u64,

    /// Node type.
    pub kind: NodeKind,

    /// Whether the entry is a symbolic link.
    pub is_symlink: bool,

    /// Directory nesting below the root; entries directly under the root are 0.
    pub depth: usize,
}

impl FileDescriptor {
    /// Create a descriptor for a regular file.
    pub fn file(
        path: impl Into<PathBuf>,
        relative_path: impl Into<CompactString>,
        size: u64,
        depth: usize,
    ) -> Self {
        Self {
            path: path.into(),
            relative_path: relative_path.into(),
            size,
            kind: NodeKind::File,
            is_symlink: false,
            depth,
        }
    }

    /// Create a descriptor for a directory.
    pub fn directory(
        path: impl Into<PathBuf>,
        relative_path: impl Into<CompactString>,
        depth: usize,
    ) -> Self {
        Self {
            path: path.into(),
            relative_path: relative_path.into(),
            size: 0,
            kind: NodeKind::Directory,
            is_symlink: false,
            depth,
        }
    }

    /// Create a descriptor for a symbolic link.
    pub fn symlink(
        path: impl Into<PathBuf>,
        relative_path: impl Into<CompactString>,
        depth: usize,
    ) -> Self {
        Self {
            path: path.into(),
            relative_path: relative_path.into(),
            size: 0,
            kind: NodeKind::Symlink,
            is_symlink: true,
            depth,
        }
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// File name component.
    pub fn name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(self.relative_path.as_str())
    }

    /// Lower-cased extension without the dot, empty when there is none.
    pub fn extension(&self) -> String {
        extension_of(Path::new(self.name()))
    }

    /// Language derived from the extension.
    pub fn language(&self) -> &'static str {
        language_name(&self.extension())
    }
}

/// Lower-cased extension of a path, empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}
