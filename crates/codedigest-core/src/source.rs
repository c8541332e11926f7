//! Descriptive metadata about where the scanned tree came from.

use serde::{Deserialize, Serialize};

/// Optional metadata surfaced in the summary, e.g. for a repository that an
/// external collaborator fetched into a local directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// Display label (defaults to the root directory name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Remote location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Branch, tag or commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl SourceInfo {
    /// Metadata with only a label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    /// Whether nothing is set.
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.url.is_none() && self.revision.is_none()
    }
}
