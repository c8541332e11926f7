//! Content classification, extraction and redaction for codedigest.
//!
//! - [`classify`](classify::classify) decides text vs binary by sniffing
//!   the leading bytes
//! - [`StreamDecoder`] decodes large files chunk by chunk
//! - [`render_notebook`] turns `.ipynb` documents into readable text
//! - [`Redactor`] replaces secret-shaped substrings with a placeholder
//! - [`ContentExtractor`] ties them together per file and per batch

pub mod classify;
mod decode;
mod extract;
mod notebook;
mod redact;

pub use classify::{Classification, SNIFF_BYTES};
pub use decode::{StreamDecoder, decode_all};
pub use extract::{ContentExtractor, ExtractionBatch, fence_base64};
pub use notebook::{NotebookOptions, fence_len, fenced, render_notebook};
pub use redact::{
    BUILTIN_PATTERNS, RedactionOutcome, Redactor, SecretPatternDef, ValueRedaction,
    shannon_entropy,
};
