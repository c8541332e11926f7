//! Core types and configuration for codedigest.
//!
//! This crate provides the data structures shared by every pipeline stage:
//! configuration, file descriptors, statistics, content results, progress
//! events, and the error/warning types.

mod config;
mod content;
mod error;
mod language;
mod node;
mod progress;
mod source;
mod stats;

pub use config::{
    BinaryPolicy, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_FILES, DEFAULT_MAX_TOTAL_SIZE,
    DEFAULT_PLACEHOLDER, DEFAULT_SEPARATOR, DigestConfig, DigestConfigBuilder,
    DigestConfigBuilderError, OutputFormat, TreeMode, VirtualFolder,
};
pub use content::{ContentKind, ContentResult};
pub use error::{DigestError, DigestWarning, WarningKind};
pub use language::{Language, language_for_extension, language_name};
pub use node::{FileDescriptor, NodeKind, extension_of};
pub use progress::{
    Operation, PROGRESS_CHANNEL_SIZE, ProgressEvent, ProgressMode, ProgressReporter,
};
pub use source::SourceInfo;
pub use stats::{DigestStats, SizeBucket, SkipReason, TraversalStatistics};
