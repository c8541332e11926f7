//! Digest configuration types.

use std::collections::{BTreeMap, HashSet};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::DigestError;

/// Default ceiling on emitted files.
pub const DEFAULT_MAX_FILES: usize = 10_000;

/// Default ceiling on the summed size of emitted files (50 MiB).
pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 50 * 1024 * 1024;

/// Default ceiling on a single file (1 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Default separator placed between digest sections.
pub const DEFAULT_SEPARATOR: &str = "\n\n---\n\n";

/// Default redaction placeholder.
pub const DEFAULT_PLACEHOLDER: &str = "[REDACTED]";

/// How non-text files are represented in the digest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum BinaryPolicy {
    /// Emit a short skip marker instead of the content.
    #[default]
    Skip,
    /// Emit a placeholder stating the byte size.
    IncludePlaceholder,
    /// Emit the base64-encoded payload.
    IncludeBase64,
}

/// Shape of the final artifact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

/// Which paths the tree rendering covers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum TreeMode {
    /// Every scanned path.
    #[default]
    Full,
    /// Selected leaves plus their ancestor directories.
    Minimal,
}

/// A named group of glob rules applied as an additional selection filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualFolder {
    /// Preset name referenced by `active_presets`.
    pub name: String,

    /// Human-readable description shown in the summary.
    #[serde(default)]
    pub description: Option<String>,

    /// Globs a file must match (any of) to belong to the folder.
    #[serde(default)]
    pub include: Vec<String>,

    /// Globs that remove a file from the folder.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl VirtualFolder {
    /// Create a folder from include globs.
    pub fn new(name: impl Into<String>, include: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            include,
            exclude: Vec::new(),
        }
    }

    /// Add exclusion globs.
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }
}

/// Configuration for a single digest run.
///
/// Supplied whole per run and never mutated by the pipeline. Field names
/// serialize in camelCase so the same document can come from a TOML file
/// or a host-supplied JSON object.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default, build_fn(validate = "Self::validate"))]
#[serde(rename_all = "camelCase", default)]
pub struct DigestConfig {
    /// Maximum number of files emitted by traversal.
    pub max_files: usize,

    /// Maximum summed size of emitted files.
    pub max_total_size_bytes: u64,

    /// Maximum size of a single file.
    pub max_file_size: u64,

    /// Maximum directory nesting below the root (files directly under the
    /// root are at depth 0).
    pub max_directory_depth: usize,

    /// Handling of binary files.
    pub binary_policy: BinaryPolicy,

    /// Artifact shape.
    pub output_format: OutputFormat,

    /// Token cost model identifier (`default`, `gpt`, `claude`, ...).
    pub token_model: String,

    /// Per-extension divisor overrides for token estimation.
    pub token_divisor_overrides: BTreeMap<String, f64>,

    /// Weight applied to comment-like lines during token estimation.
    pub comment_weight: f64,

    /// Run the redaction filter over extracted text.
    pub redaction_enabled: bool,

    /// Caller-supplied redaction patterns (regex, literal on parse failure).
    pub redaction_patterns: Vec<String>,

    /// Replacement for redacted spans.
    pub redaction_placeholder: String,

    /// Enable the built-in credential shape detectors.
    pub redact_builtin_patterns: bool,

    /// Minimum Shannon entropy (bits per char) for the keyword heuristic.
    pub entropy_threshold: f64,

    /// Minimum token length for the keyword heuristic.
    pub entropy_min_length: usize,

    /// Keywords that arm the entropy heuristic.
    pub entropy_keywords: Vec<String>,

    /// How many characters after a keyword the heuristic looks at.
    pub entropy_window: usize,

    /// Globs a file must match (any of); empty means everything.
    pub include_patterns: Vec<String>,

    /// Globs that reject a file.
    pub exclude_patterns: Vec<String>,

    /// Root-level rules in gitignore syntax, applied below every ignore file.
    pub ignore_patterns: Vec<String>,

    /// Load ignore files found in the tree.
    pub respect_gitignore: bool,

    /// Names of per-directory ignore files.
    pub ignore_file_names: Vec<String>,

    /// Named glob groups.
    pub virtual_folders: Vec<VirtualFolder>,

    /// Virtual folders applied as filters for this run.
    pub active_presets: Vec<String>,

    /// Separator between summary, tree and file chunks.
    pub output_separator: String,

    /// Render a directory tree.
    pub include_tree: bool,

    /// Tree coverage.
    pub tree_mode: TreeMode,

    /// Render the summary block.
    pub include_summary: bool,

    /// Prefix every file chunk with a header.
    pub include_file_headers: bool,

    /// Files larger than this are read in chunks.
    pub streaming_threshold_bytes: u64,

    /// Chunk size for streamed reads.
    pub read_chunk_bytes: usize,

    /// Maximum concurrent file reads.
    pub read_concurrency: usize,

    /// Number of traversal threads (0 = auto-detect).
    pub threads: usize,

    /// Render code cell outputs of notebooks.
    pub notebook_include_outputs: bool,

    /// Render non-text notebook outputs (images, html).
    pub notebook_include_non_text_outputs: bool,

    /// Byte ceiling for a single non-text notebook output.
    pub notebook_output_max_bytes: usize,

    /// Emit a progress event every this many entries.
    pub progress_interval: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_total_size_bytes: DEFAULT_MAX_TOTAL_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_directory_depth: 64,
            binary_policy: BinaryPolicy::default(),
            output_format: OutputFormat::default(),
            token_model: "default".to_string(),
            token_divisor_overrides: BTreeMap::new(),
            comment_weight: 1.0,
            redaction_enabled: true,
            redaction_patterns: Vec::new(),
            redaction_placeholder: DEFAULT_PLACEHOLDER.to_string(),
            redact_builtin_patterns: true,
            entropy_threshold: 3.5,
            entropy_min_length: 20,
            entropy_keywords: ["key", "token", "secret", "password"]
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            entropy_window: 40,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            ignore_patterns: vec![".git/".to_string()],
            respect_gitignore: true,
            ignore_file_names: vec![".gitignore".to_string(), ".digestignore".to_string()],
            virtual_folders: Vec::new(),
            active_presets: Vec::new(),
            output_separator: DEFAULT_SEPARATOR.to_string(),
            include_tree: true,
            tree_mode: TreeMode::default(),
            include_summary: true,
            include_file_headers: true,
            streaming_threshold_bytes: 256 * 1024,
            read_chunk_bytes: 64 * 1024,
            read_concurrency: 4,
            threads: 0,
            notebook_include_outputs: true,
            notebook_include_non_text_outputs: false,
            notebook_output_max_bytes: 4096,
            progress_interval: 256,
        }
    }
}

impl DigestConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(weight) = self.comment_weight
            && !(weight.is_finite() && weight >= 0.0)
        {
            return Err(format!("commentWeight must be a non-negative number, got {weight}"));
        }
        if let Some(ref separator) = self.output_separator
            && separator.is_empty()
        {
            return Err("outputSeparator cannot be empty".to_string());
        }
        Ok(())
    }
}

impl DigestConfig {
    /// Create a new config builder.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder::default()
    }

    /// Parse a configuration from a JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DigestError> {
        let config: Self = serde_json::from_value(value).map_err(|e| DigestError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the whole configuration for values the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), DigestError> {
        let invalid = |message: String| Err(DigestError::InvalidConfig { message });

        if !(self.comment_weight.is_finite() && self.comment_weight >= 0.0) {
            return invalid(format!(
                "commentWeight must be a non-negative number, got {}",
                self.comment_weight
            ));
        }
        if !(self.entropy_threshold.is_finite() && self.entropy_threshold >= 0.0) {
            return invalid(format!(
                "entropyThreshold must be a non-negative number, got {}",
                self.entropy_threshold
            ));
        }
        for (ext, divisor) in &self.token_divisor_overrides {
            if !(divisor.is_finite() && *divisor > 0.0) {
                return invalid(format!(
                    "tokenDivisorOverrides.{ext} must be a positive number, got {divisor}"
                ));
            }
        }
        if self.read_chunk_bytes == 0 {
            return invalid("readChunkBytes must be greater than zero".to_string());
        }
        if self.read_concurrency == 0 {
            return invalid("readConcurrency must be greater than zero".to_string());
        }
        if self.output_separator.is_empty() {
            return invalid("outputSeparator cannot be empty".to_string());
        }
        if self.redaction_enabled && self.redaction_placeholder.is_empty() {
            return invalid("redactionPlaceholder cannot be empty".to_string());
        }

        let mut names = HashSet::new();
        for folder in &self.virtual_folders {
            if folder.name.trim().is_empty() {
                return invalid("virtual folder names cannot be empty".to_string());
            }
            if !names.insert(folder.name.as_str()) {
                return invalid(format!("duplicate virtual folder '{}'", folder.name));
            }
        }
        for preset in &self.active_presets {
            if !names.contains(preset.as_str()) {
                return invalid(format!("unknown preset '{preset}'"));
            }
        }

        Ok(())
    }

    /// Look up a virtual folder by name.
    pub fn virtual_folder(&self, name: &str) -> Option<&VirtualFolder> {
        self.virtual_folders.iter().find(|f| f.name == name)
    }

    /// Virtual folders selected by `active_presets`, in activation order.
    pub fn active_virtual_folders(&self) -> impl Iterator<Item = &VirtualFolder> {
        self.active_presets
            .iter()
            .filter_map(|name| self.virtual_folder(name))
    }

    /// Divisor override for a file extension, if configured.
    pub fn divisor_override(&self, extension: &str) -> Option<f64> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.token_divisor_overrides.get(&ext).copied()
    }
}
