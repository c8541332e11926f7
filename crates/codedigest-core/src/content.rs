//! Per-file extraction results.

use serde::{Deserialize, Serialize};

/// How a file's body was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    /// Decoded text.
    Text,
    /// Rendered notebook cells.
    Notebook,
    /// Binary file replaced with a size placeholder.
    BinaryPlaceholder,
    /// Binary file encoded as base64.
    BinaryBase64,
    /// Binary file replaced with a skip marker.
    BinarySkipped,
    /// Reading or decoding failed; the body is a placeholder.
    ExtractionFailed,
}

/// Extracted content for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentResult {
    /// Text body, placeholder or base64 surrogate.
    pub text: String,
    /// The file was classified as binary.
    pub is_binary: bool,
    /// At least one redaction substitution happened.
    pub redaction_applied: bool,
    /// How the body was produced.
    pub kind: ContentKind,
    /// Bytes read from disk.
    pub bytes_read: u64,
    /// Failure description for `ExtractionFailed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentResult {
    /// Text content.
    pub fn text(text: String, bytes_read: u64) -> Self {
        Self {
            text,
            is_binary: false,
            redaction_applied: false,
            kind: ContentKind::Text,
            bytes_read,
            error: None,
        }
    }

    /// Binary content represented by `text` (placeholder or payload).
    pub fn binary(text: String, kind: ContentKind, bytes_read: u64) -> Self {
        Self {
            text,
            is_binary: true,
            redaction_applied: false,
            kind,
            bytes_read,
            error: None,
        }
    }

    /// Placeholder for a file that could not be extracted.
    pub fn failed(display_path: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            text: format!("[unable to read {display_path}: {error}]"),
            is_binary: false,
            redaction_applied: false,
            kind: ContentKind::ExtractionFailed,
            bytes_read: 0,
            error: Some(error),
        }
    }

    /// Whether extraction failed.
    pub fn is_failure(&self) -> bool {
        self.kind == ContentKind::ExtractionFailed
    }
}
