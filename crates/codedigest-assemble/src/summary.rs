//! Digest summary block.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use humansize::{BINARY, format_size};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use codedigest_core::{DigestStats, SizeBucket, SkipReason, SourceInfo, TraversalStatistics};

/// Aggregate facts about an assembled digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestSummary {
    #[serde(skip_serializing_if = "SourceInfo::is_empty", default)]
    pub source: SourceInfo,
    pub file_count: u64,
    pub total_bytes: u64,
    pub estimated_tokens: usize,
    pub token_model: String,
    pub binary_files: u64,
    pub redacted_files: u64,
    pub languages: BTreeMap<String, u64>,
    pub extensions: BTreeMap<String, u64>,
    pub size_buckets: BTreeMap<SizeBucket, u64>,
    /// Skip counters in reason order; zero counts are omitted.
    pub skipped: IndexMap<String, u64>,
    /// Directories left unread because of `maxDirectoryDepth`; their files
    /// are not part of `skipped`.
    #[serde(skip_serializing_if = "is_zero", default)]
    pub directories_too_deep: u64,
    pub warnings: usize,
    pub generated_at: DateTime<Utc>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl DigestSummary {
    pub(crate) fn new(
        source: SourceInfo,
        stats: DigestStats,
        statistics: Option<&TraversalStatistics>,
        token_model: String,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let skipped = statistics
            .map(|s| {
                SkipReason::iter()
                    .map(|reason| (reason.to_string(), s.skipped(reason)))
                    .filter(|(_, n)| *n > 0)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            source,
            file_count: stats.file_count,
            total_bytes: stats.total_size,
            estimated_tokens: 0,
            token_model,
            binary_files: 0,
            redacted_files: 0,
            languages: stats.languages,
            extensions: stats.extensions,
            size_buckets: stats.size_buckets,
            skipped,
            directories_too_deep: statistics.map_or(0, |s| s.directories_too_deep),
            warnings: statistics.map_or(0, |s| s.warnings.len()),
            generated_at,
        }
    }

    fn source_line(&self) -> Option<String> {
        if self.source.is_empty() {
            return None;
        }
        let mut line = self.source.label.clone().unwrap_or_default();
        if let Some(url) = &self.source.url {
            if line.is_empty() {
                line = url.clone();
            } else {
                line.push_str(&format!(" ({url})"));
            }
        }
        if let Some(revision) = &self.source.revision {
            line.push_str(&format!(" @ {revision}"));
        }
        Some(line.trim().to_string())
    }

    /// `(label, value)` rows shared by the text and markdown renderings.
    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = Vec::new();
        if let Some(source) = self.source_line() {
            rows.push(("Source", source));
        }
        rows.push(("Files", self.file_count.to_string()));
        rows.push(("Total size", format_size(self.total_bytes, BINARY)));
        rows.push((
            "Estimated tokens",
            format!("~{} ({})", self.estimated_tokens, self.token_model),
        ));
        if self.binary_files > 0 {
            rows.push(("Binary files", self.binary_files.to_string()));
        }
        if self.redacted_files > 0 {
            rows.push(("Redacted files", self.redacted_files.to_string()));
        }
        if !self.languages.is_empty() {
            rows.push(("Languages", breakdown(&self.languages)));
        }
        if !self.extensions.is_empty() {
            let named = self
                .extensions
                .iter()
                .map(|(ext, n)| (if ext.is_empty() { "(none)" } else { ext.as_str() }, *n));
            rows.push(("Extensions", breakdown_pairs(named)));
        }
        let buckets = self
            .size_buckets
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(bucket, n)| format!("{bucket} ({n})"))
            .join(", ");
        if !buckets.is_empty() {
            rows.push(("Sizes", buckets));
        }
        if !self.skipped.is_empty() {
            let skipped = self.skipped.iter().map(|(k, n)| format!("{k} {n}")).join(", ");
            rows.push(("Skipped", skipped));
        }
        if self.directories_too_deep > 0 {
            rows.push((
                "Too deep",
                format!("{} directories not read", self.directories_too_deep),
            ));
        }
        rows.push(("Warnings", self.warnings.to_string()));
        rows.push((
            "Generated",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
        rows
    }

    pub fn render_text(&self) -> String {
        let width = self.rows().iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
        let body = self
            .rows()
            .into_iter()
            .map(|(label, value)| format!("{:<width$} {value}", format!("{label}:")))
            .join("\n");
        format!("Digest summary\n{body}")
    }

    pub fn render_markdown(&self) -> String {
        let body = self
            .rows()
            .into_iter()
            .map(|(label, value)| format!("- **{label}:** {value}"))
            .join("\n");
        format!("# Digest summary\n\n{body}")
    }
}

/// `Rust (10), Markdown (2)`, largest first.
fn breakdown(counts: &BTreeMap<String, u64>) -> String {
    breakdown_pairs(counts.iter().map(|(k, n)| (k.as_str(), *n)))
}

fn breakdown_pairs<'a>(pairs: impl Iterator<Item = (&'a str, u64)>) -> String {
    pairs
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
        .map(|(name, n)| format!("{name} ({n})"))
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use codedigest_core::FileDescriptor;

    fn summary() -> DigestSummary {
        let files = vec![
            FileDescriptor::file("/r/a.rs", "a.rs", 10, 0),
            FileDescriptor::file("/r/b.rs", "b.rs", 20, 0),
            FileDescriptor::file("/r/README.md", "README.md", 2048, 0),
        ];
        let mut statistics = TraversalStatistics::new();
        statistics.record_skip(SkipReason::Ignore);
        statistics.record_skip(SkipReason::Size);
        statistics.directories_too_deep = 2;

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        DigestSummary::new(
            SourceInfo {
                label: Some("demo".into()),
                url: Some("https://example.com/demo".into()),
                revision: Some("main".into()),
            },
            DigestStats::from_descriptors(&files),
            Some(&statistics),
            "claude".into(),
            at,
        )
    }

    #[test]
    fn test_text_rendering() {
        let text = summary().render_text();
        assert!(text.starts_with("Digest summary\n"));
        assert!(text.contains("demo (https://example.com/demo) @ main"));
        assert!(text.contains("Files:"));
        assert!(text.contains("Rust (2), Markdown (1)"));
        assert!(text.contains("Generated:        2024-05-01T12:00:00Z"));
    }

    #[test]
    fn test_skips_in_reason_order() {
        let summary = summary();
        let keys: Vec<&String> = summary.skipped.keys().collect();
        assert_eq!(keys, ["size", "ignore"]);
        let markdown = summary.render_markdown();
        assert!(markdown.contains("- **Skipped:** size 1, ignore 1"));
        assert!(markdown.contains("- **Too deep:** 2 directories not read"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["fileCount"], 3);
        assert_eq!(json["totalBytes"], 2078);
        assert_eq!(json["generatedAt"], "2024-05-01T12:00:00Z");
        assert_eq!(json["directoriesTooDeep"], 2);
    }
}
