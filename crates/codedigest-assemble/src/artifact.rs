//! The assembled digest.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use codedigest_core::{ContentKind, DigestError, OutputFormat};

use crate::summary::DigestSummary;

/// One file as it appears in a JSON digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub language: String,
    pub tokens: usize,
    pub binary: bool,
    pub redacted: bool,
    pub kind: ContentKind,
    pub content: String,
}

/// Top-level shape of a JSON digest.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JsonDigest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub summary: Option<DigestSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tree: Option<String>,
    pub files: Vec<FileEntry>,
}

/// The joined digest body.
#[derive(Debug, Clone, PartialEq)]
pub enum DigestOutput {
    /// Text or markdown, sections joined by the separator.
    Text(String),
    /// `{summary, tree, files}`.
    Json(Value),
}

impl DigestOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Text(_) => None,
            Self::Json(value) => Some(value),
        }
    }

    /// The output as written to a file or stdout; JSON is pretty-printed.
    pub fn render(&self) -> Result<String, DigestError> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::Json(value) => Ok(serde_json::to_string_pretty(value)?),
        }
    }
}

impl fmt::Display for DigestOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Json(value) => write!(f, "{value:#}"),
        }
    }
}

/// A rendered digest plus the facts it was built from.
#[derive(Debug, Clone)]
pub struct DigestArtifact {
    /// Output format of [`Self::output`].
    pub format: OutputFormat,
    pub output: DigestOutput,
    /// Summary, computed even when it is not rendered.
    pub summary: DigestSummary,
    /// Rendered tree, when enabled.
    pub tree: Option<String>,
    /// Separator between sections (text and markdown only).
    pub separator: String,
    /// Number of files in the digest.
    pub file_count: usize,
    /// Byte range of each file chunk inside a text output, in file order.
    pub(crate) chunk_spans: Vec<Range<usize>>,
}

impl DigestArtifact {
    pub fn estimated_tokens(&self) -> usize {
        self.summary.estimated_tokens
    }

    pub fn is_empty(&self) -> bool {
        match &self.output {
            DigestOutput::Text(text) => text.is_empty(),
            DigestOutput::Json(_) => self.file_count == 0,
        }
    }

    /// Recover the per-file chunks from [`Self::output`].
    ///
    /// Text and markdown chunks are sliced out at the offsets recorded while
    /// assembling, so bodies that contain the separator come back intact.
    /// JSON digests yield each entry of `files` in compact form.
    pub fn file_chunks_from_output(&self) -> Result<Vec<String>, DigestError> {
        match &self.output {
            DigestOutput::Text(text) => self
                .chunk_spans
                .iter()
                .map(|span| {
                    text.get(span.clone())
                        .map(str::to_string)
                        .ok_or_else(|| DigestError::InconsistentInput {
                            message: format!("chunk span {span:?} outside the digest"),
                        })
                })
                .collect(),
            DigestOutput::Json(value) => value
                .get("files")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .map(|entry| serde_json::to_string(entry).map_err(DigestError::from))
                .collect(),
        }
    }
}
