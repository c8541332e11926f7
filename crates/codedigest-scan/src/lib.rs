//! Traversal engine for codedigest.
//!
//! Walks a source tree with jwalk and turns it into an ordered list of
//! [`FileDescriptor`]s, applying in order:
//!
//! - **Ignore rules** from `ignorePatterns` and per-directory ignore files,
//!   evaluated as an explicit stack with last-match-wins
//! - **Selection filters** (include/exclude globs and active presets)
//! - **Limits** on depth, file size, file count and total bytes
//!
//! Every candidate that is not emitted lands in exactly one skip counter of
//! [`TraversalStatistics`].
//!
//! # Example
//!
//! ```rust,no_run
//! use codedigest_scan::{DigestConfig, DigestScanner};
//!
//! let scanner = DigestScanner::new();
//! let outcome = scanner.scan("/path/to/repo".as_ref(), &DigestConfig::default()).unwrap();
//!
//! println!("Selected {} files", outcome.files.len());
//! println!("Skipped {}", outcome.statistics.total_skipped());
//! ```

mod cache;
mod filter;
mod rules;
mod scanner;

pub use cache::{HydratedListing, ListingCache, ListingKey};
pub use filter::SelectionFilter;
pub use rules::{DirectoryAction, IgnoreRule, RuleDecision, RuleStack};
pub use scanner::{DigestScanner, ScanOutcome};

// Re-export core types for convenience
pub use codedigest_core::{
    DigestConfig, DigestError, DigestStats, DigestWarning, FileDescriptor, SkipReason,
    TraversalStatistics, WarningKind,
};
