//! Traversal statistics and aggregate digest statistics.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::DigestWarning;
use crate::node::FileDescriptor;

/// Why a candidate file was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SkipReason {
    /// Larger than `maxFileSize`.
    Size,
    /// Would push the emitted total past `maxTotalSizeBytes`.
    TotalLimit,
    /// `maxFiles` files were already emitted.
    MaxFiles,
    /// Deeper than `maxDirectoryDepth`.
    Depth,
    /// Matched an ignore rule.
    Ignore,
    /// Rejected by include/exclude globs or presets.
    Filter,
    /// A symbolic link.
    Symlink,
    /// Metadata could not be read.
    Error,
}

/// Counters for a single scan.
///
/// Mutated only while the scan runs. Every examined candidate ends up either
/// emitted or in exactly one skip bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalStatistics {
    /// Candidate files examined.
    pub files_examined: u64,
    /// Bytes of candidate files examined (as reported by metadata).
    pub bytes_examined: u64,
    /// Files emitted as descriptors.
    pub files_emitted: u64,
    /// Bytes of emitted files.
    pub bytes_emitted: u64,
    pub skipped_by_size: u64,
    pub skipped_by_total_limit: u64,
    pub skipped_by_max_files: u64,
    pub skipped_by_depth: u64,
    pub skipped_by_ignore: u64,
    pub skipped_by_filter: u64,
    pub skipped_symlinks: u64,
    pub skipped_by_error: u64,
    /// Directories not descended into (ignore rules or depth).
    pub directories_pruned: u64,
    /// The part of `directories_pruned` cut by `maxDirectoryDepth`. Files
    /// below them are never examined, so `skipped_by_depth` does not see them.
    pub directories_too_deep: u64,
    /// Directories walked.
    pub directories_scanned: u64,
    /// Non-fatal warnings.
    pub warnings: Vec<DigestWarning>,
    /// Wall time of the scan.
    pub elapsed: Duration,
    /// The scan stopped early because it was cancelled.
    pub cancelled: bool,
}

impl TraversalStatistics {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an examined candidate.
    pub fn record_candidate(&mut self, size: u64) {
        self.files_examined += 1;
        self.bytes_examined += size;
    }

    /// Record an emitted file.
    pub fn record_emitted(&mut self, size: u64) {
        self.files_emitted += 1;
        self.bytes_emitted += size;
    }

    /// Record a skipped candidate. Returns `true` the first time this reason fires.
    pub fn record_skip(&mut self, reason: SkipReason) -> bool {
        let counter = match reason {
            SkipReason::Size => &mut self.skipped_by_size,
            SkipReason::TotalLimit => &mut self.skipped_by_total_limit,
            SkipReason::MaxFiles => &mut self.skipped_by_max_files,
            SkipReason::Depth => &mut self.skipped_by_depth,
            SkipReason::Ignore => &mut self.skipped_by_ignore,
            SkipReason::Filter => &mut self.skipped_by_filter,
            SkipReason::Symlink => &mut self.skipped_symlinks,
            SkipReason::Error => &mut self.skipped_by_error,
        };
        *counter += 1;
        *counter == 1
    }

    /// Count for one skip reason.
    pub fn skipped(&self, reason: SkipReason) -> u64 {
        match reason {
            SkipReason::Size => self.skipped_by_size,
            SkipReason::TotalLimit => self.skipped_by_total_limit,
            SkipReason::MaxFiles => self.skipped_by_max_files,
            SkipReason::Depth => self.skipped_by_depth,
            SkipReason::Ignore => self.skipped_by_ignore,
            SkipReason::Filter => self.skipped_by_filter,
            SkipReason::Symlink => self.skipped_symlinks,
            SkipReason::Error => self.skipped_by_error,
        }
    }

    /// Sum of all skip buckets.
    pub fn total_skipped(&self) -> u64 {
        SkipReason::iter().map(|r| self.skipped(r)).sum()
    }

    /// Whether a size, count or depth ceiling dropped any candidate.
    pub fn limits_hit(&self) -> bool {
        self.skipped_by_size
            + self.skipped_by_total_limit
            + self.skipped_by_max_files
            + self.skipped_by_depth
            + self.directories_too_deep
            > 0
    }

    /// Add a warning.
    pub fn warn(&mut self, warning: DigestWarning) {
        self.warnings.push(warning);
    }

    /// Check if there were any warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// File size distribution bucket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum SizeBucket {
    #[strum(serialize = "≤1KB")]
    #[serde(rename = "≤1KB")]
    Tiny,
    #[strum(serialize = "1–10KB")]
    #[serde(rename = "1–10KB")]
    Small,
    #[strum(serialize = "10–100KB")]
    #[serde(rename = "10–100KB")]
    Medium,
    #[strum(serialize = "100KB–1MB")]
    #[serde(rename = "100KB–1MB")]
    Large,
    #[strum(serialize = ">1MB")]
    #[serde(rename = ">1MB")]
    Huge,
}

impl SizeBucket {
    /// Bucket for a byte size.
    pub fn for_size(size: u64) -> Self {
        const KB: u64 = 1024;
        match size {
            s if s <= KB => Self::Tiny,
            s if s <= 10 * KB => Self::Small,
            s if s <= 100 * KB => Self::Medium,
            s if s <= 1024 * KB => Self::Large,
            _ => Self::Huge,
        }
    }
}

/// Aggregate statistics over a descriptor list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestStats {
    /// Number of files.
    pub file_count: u64,
    /// Total size in bytes.
    pub total_size: u64,
    /// Files per extension (`""` for none).
    pub extensions: BTreeMap<String, u64>,
    /// Files per language.
    pub languages: BTreeMap<String, u64>,
    /// Files per size bucket.
    pub size_buckets: BTreeMap<SizeBucket, u64>,
    /// Largest file (relative path, size).
    pub largest_file: Option<(PathBuf, u64)>,
}

impl DigestStats {
    /// Compute statistics in one pass over the descriptors.
    pub fn from_descriptors<'a>(files: impl IntoIterator<Item = &'a FileDescriptor>) -> Self {
        let mut stats = Self::default();
        for bucket in SizeBucket::iter() {
            stats.size_buckets.insert(bucket, 0);
        }

        for file in files.into_iter().filter(|f| f.is_file()) {
            stats.file_count += 1;
            stats.total_size += file.size;

            let ext = file.extension();
            *stats.languages.entry(file.language().to_string()).or_default() += 1;
            *stats.extensions.entry(ext).or_default() += 1;
            *stats.size_buckets.entry(SizeBucket::for_size(file.size)).or_default() += 1;

            if stats.largest_file.as_ref().is_none_or(|(_, s)| file.size > *s) {
                stats.largest_file = Some((PathBuf::from(file.relative_path.as_str()), file.size));
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_skip_reports_first_hit() {
        let mut stats = TraversalStatistics::new();
        assert!(stats.record_skip(SkipReason::Size));
        assert!(!stats.record_skip(SkipReason::Size));
        assert!(stats.record_skip(SkipReason::MaxFiles));
        assert_eq!(stats.skipped_by_size, 2);
        assert_eq!(stats.total_skipped(), 3);
        assert!(stats.limits_hit());
    }

    #[test]
    fn test_ignore_skips_are_not_limits() {
        let mut stats = TraversalStatistics::new();
        stats.record_skip(SkipReason::Ignore);
        stats.record_skip(SkipReason::Filter);
        assert!(!stats.limits_hit());
    }

    #[test]
    fn test_size_buckets() {
        assert_eq!(SizeBucket::for_size(0), SizeBucket::Tiny);
        assert_eq!(SizeBucket::for_size(1024), SizeBucket::Tiny);
        assert_eq!(SizeBucket::for_size(1025), SizeBucket::Small);
        assert_eq!(SizeBucket::for_size(50 * 1024), SizeBucket::Medium);
        assert_eq!(SizeBucket::for_size(1024 * 1024), SizeBucket::Large);
        assert_eq!(SizeBucket::for_size(2 * 1024 * 1024), SizeBucket::Huge);
        assert_eq!(SizeBucket::Huge.to_string(), ">1MB");
    }

    #[test]
    fn test_digest_stats_single_pass() {
        let files = vec![
            FileDescriptor::file("/r/a.rs", "a.rs", 100, 0),
            FileDescriptor::file("/r/src/b.rs", "src/b.rs", 5000, 1),
            FileDescriptor::file("/r/README.md", "README.md", 200, 0),
            FileDescriptor::directory("/r/src", "src", 0),
        ];
        let stats = DigestStats::from_descriptors(&files);

        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.total_size, 5300);
        assert_eq!(stats.extensions["rs"], 2);
        assert_eq!(stats.languages["Markdown"], 1);
        assert_eq!(stats.size_buckets[&SizeBucket::Tiny], 2);
        assert_eq!(stats.size_buckets[&SizeBucket::Small], 1);
        assert_eq!(stats.size_buckets[&SizeBucket::Huge], 0);
        assert_eq!(stats.largest_file, Some((PathBuf::from("src/b.rs"), 5000)));
    }
}
