//! Digest assembly for codedigest.
//!
//! [`Assembler`] renders already-extracted files as one text, markdown or
//! JSON artifact with an optional summary and directory tree.
//! [`DigestPipeline`] runs the whole flow for a root directory:
//!
//! 1. scan with ignore rules, filters and limits
//! 2. narrow to an optional caller selection and sort by path
//! 3. extract and redact content on a bounded read pool
//! 4. estimate tokens and assemble
//!
//! # Example
//!
//! ```rust,no_run
//! use codedigest_assemble::{DigestPipeline, DigestRequest, DigestStatus};
//! use codedigest_core::DigestConfig;
//!
//! let outcome = DigestPipeline::new()
//!     .run(DigestRequest::new("/path/to/repo", DigestConfig::default()))
//!     .unwrap();
//!
//! if let Some(artifact) = &outcome.artifact {
//!     println!("{}", artifact.output);
//! }
//! assert_ne!(outcome.status, DigestStatus::Cancelled);
//! ```

mod artifact;
mod assembler;
mod pipeline;
mod summary;
mod tree;

pub use artifact::{DigestArtifact, DigestOutput, FileEntry};
pub use assembler::{Assembler, AssemblyInput};
pub use pipeline::{DigestOutcome, DigestPipeline, DigestRequest, DigestStatus};
pub use summary::DigestSummary;
pub use tree::DirectoryTree;
