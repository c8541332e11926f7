//! Rendering of extracted files into a single digest.

use chrono::{DateTime, Utc};
use humansize::{BINARY, format_size};
use itertools::Itertools;
use tracing::{debug, info};

use codedigest_content::fenced;
use codedigest_core::{
    ContentKind, ContentResult, DigestConfig, DigestError, DigestStats, FileDescriptor,
    Operation, OutputFormat, ProgressReporter, SourceInfo, TraversalStatistics, TreeMode,
    language_for_extension,
};
use codedigest_tokens::TokenEstimator;

use crate::artifact::{DigestArtifact, DigestOutput, FileEntry, JsonDigest};
use crate::summary::DigestSummary;
use crate::tree::DirectoryTree;

/// Context the assembler needs beyond the files themselves.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInput<'a> {
    /// Label for the tree root and default summary label.
    pub root_label: String,
    pub source: SourceInfo,
    /// Traversal counters for the summary.
    pub statistics: Option<&'a TraversalStatistics>,
    /// Every file the scan emitted, used for the `full` tree.
    pub scanned: Option<&'a [FileDescriptor]>,
    /// Warnings raised after traversal (extraction, redaction).
    pub extra_warnings: usize,
    /// Fixed timestamp; `now` when unset.
    pub generated_at: Option<DateTime<Utc>>,
}

impl<'a> AssemblyInput<'a> {
    pub fn new(root_label: impl Into<String>) -> Self {
        Self {
            root_label: root_label.into(),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.source = source;
        self
    }

    pub fn with_statistics(mut self, statistics: &'a TraversalStatistics) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn with_scanned(mut self, scanned: &'a [FileDescriptor]) -> Self {
        self.scanned = Some(scanned);
        self
    }

    pub fn with_extra_warnings(mut self, count: usize) -> Self {
        self.extra_warnings = count;
        self
    }

    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }
}

/// Renders files and their contents as text, markdown or JSON.
///
/// Enforces no limits of its own; everything it is given ends up in the
/// output in the order given.
pub struct Assembler {
    config: DigestConfig,
    estimator: TokenEstimator,
    progress: ProgressReporter,
}

impl Assembler {
    /// Build an assembler, resolving the token model from `config`.
    pub fn new(config: &DigestConfig) -> Result<Self, DigestError> {
        let estimator = TokenEstimator::from_config(config)?;
        Ok(Self::with_estimator(config, estimator, ProgressReporter::new()))
    }

    pub fn with_estimator(
        config: &DigestConfig,
        estimator: TokenEstimator,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            config: config.clone(),
            estimator,
            progress,
        }
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Assemble `files` with their `contents` (same length, same order).
    pub fn assemble(
        &self,
        files: &[FileDescriptor],
        contents: &[ContentResult],
        input: &AssemblyInput<'_>,
    ) -> Result<DigestArtifact, DigestError> {
        if files.len() != contents.len() {
            return Err(DigestError::InconsistentInput {
                message: format!(
                    "{} files but {} content results",
                    files.len(),
                    contents.len()
                ),
            });
        }
        if let Some(statistics) = input.statistics
            && files.len() as u64 > statistics.files_emitted
        {
            return Err(DigestError::InconsistentInput {
                message: format!(
                    "{} files to assemble but only {} were scanned",
                    files.len(),
                    statistics.files_emitted
                ),
            });
        }

        let format = self.config.output_format;
        info!(files = files.len(), %format, "Assembling digest");
        self.progress
            .start(Operation::Assemble, format!("Assembling {} files", files.len()));

        let tokens: Vec<usize> = files
            .iter()
            .zip(contents)
            .map(|(file, content)| {
                let ext = file.extension();
                self.estimator.estimate(&content.text, Some(ext.as_str()))
            })
            .collect();

        let mut source = input.source.clone();
        if source.label.is_none() && !input.root_label.is_empty() {
            source.label = Some(input.root_label.clone());
        }
        let mut summary = DigestSummary::new(
            source,
            DigestStats::from_descriptors(files),
            input.statistics,
            self.estimator.model().to_string(),
            input.generated_at.unwrap_or_else(Utc::now),
        );
        summary.estimated_tokens = tokens.iter().sum();
        summary.binary_files = contents.iter().filter(|c| c.is_binary).count() as u64;
        summary.redacted_files = contents.iter().filter(|c| c.redaction_applied).count() as u64;
        summary.warnings += input.extra_warnings;

        let tree = self.config.include_tree.then(|| {
            let paths = match (self.config.tree_mode, input.scanned) {
                (TreeMode::Full, Some(scanned)) => scanned,
                _ => files,
            };
            DirectoryTree::from_paths(paths.iter().map(|f| f.relative_path.as_str()))
                .render(&input.root_label)
        });

        let chunks = files
            .iter()
            .zip(contents)
            .zip(&tokens)
            .map(|((file, content), tokens)| self.render_file_chunk(file, content, *tokens));

        let (output, chunk_spans) = match format {
            OutputFormat::Json => {
                let entries = files
                    .iter()
                    .zip(contents)
                    .zip(&tokens)
                    .map(|((file, content), tokens)| file_entry(file, content, *tokens))
                    .collect();
                let digest = JsonDigest {
                    summary: self.config.include_summary.then(|| summary.clone()),
                    tree: tree.clone(),
                    files: entries,
                };
                (DigestOutput::Json(serde_json::to_value(&digest)?), Vec::new())
            }
            OutputFormat::Text | OutputFormat::Markdown => {
                let mut sections = Vec::new();
                if self.config.include_summary {
                    sections.push(match format {
                        OutputFormat::Markdown => summary.render_markdown(),
                        _ => summary.render_text(),
                    });
                }
                if let Some(tree) = &tree {
                    sections.push(match format {
                        OutputFormat::Markdown => {
                            format!("## Directory tree\n\n{}", fenced("text", tree))
                        }
                        _ => format!("Directory tree:\n{}", tree.trim_end()),
                    });
                }

                let separator = self.config.output_separator.as_str();
                let mut text = sections.join(separator);
                let mut spans = Vec::with_capacity(files.len());
                for chunk in chunks {
                    if !text.is_empty() || !spans.is_empty() {
                        text.push_str(separator);
                    }
                    let start = text.len();
                    text.push_str(&chunk);
                    spans.push(start..text.len());
                }
                (DigestOutput::Text(text), spans)
            }
        };

        debug!(
            chunks = files.len(),
            tokens = summary.estimated_tokens,
            "Digest assembled"
        );
        self.progress.end(
            Operation::Assemble,
            format!("Assembled {} files (~{} tokens)", files.len(), summary.estimated_tokens),
        );

        Ok(DigestArtifact {
            format,
            output,
            summary,
            tree,
            separator: self.config.output_separator.clone(),
            file_count: files.len(),
            chunk_spans,
        })
    }

    /// Render one file as it appears in the digest.
    ///
    /// For JSON this is the compact form of its `files` entry, keys in the
    /// order a [`serde_json::Value`] keeps them.
    pub fn render_file_chunk(
        &self,
        file: &FileDescriptor,
        content: &ContentResult,
        tokens: usize,
    ) -> String {
        let headers = self.config.include_file_headers;
        match self.config.output_format {
            OutputFormat::Json => {
                serde_json::to_value(file_entry(file, content, tokens))
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            }
            OutputFormat::Text => {
                let body = content.text.strip_suffix('\n').unwrap_or(&content.text);
                if headers {
                    format!(
                        "--- FILE: {} ({}) ---\n{body}",
                        file.relative_path,
                        header_meta(file, content, tokens)
                    )
                } else {
                    body.to_string()
                }
            }
            OutputFormat::Markdown => {
                let body = match content.kind {
                    ContentKind::Text => {
                        let info = language_for_extension(&file.extension())
                            .map(|l| l.fence)
                            .unwrap_or("");
                        fenced(info, &content.text)
                    }
                    _ => content.text.clone(),
                };
                if headers {
                    format!(
                        "## {}\n\n_{}_\n\n{body}",
                        file.relative_path,
                        header_meta(file, content, tokens)
                    )
                } else {
                    body
                }
            }
        }
    }
}

fn header_meta(file: &FileDescriptor, content: &ContentResult, tokens: usize) -> String {
    let mut parts = vec![
        file.language().to_string(),
        format_size(file.size, BINARY),
        format!("~{tokens} tokens"),
    ];
    if content.is_binary {
        parts.push("binary".to_string());
    }
    if content.redaction_applied {
        parts.push("redacted".to_string());
    }
    if content.is_failure() {
        parts.push("unreadable".to_string());
    }
    parts.into_iter().join(", ")
}

fn file_entry(file: &FileDescriptor, content: &ContentResult, tokens: usize) -> FileEntry {
    FileEntry {
        path: file.relative_path.to_string(),
        size: file.size,
        language: file.language().to_string(),
        tokens,
        binary: content.is_binary,
        redacted: content.redaction_applied,
        kind: content.kind,
        content: content.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(rel: &str, size: u64) -> FileDescriptor {
        FileDescriptor::file(format!("/repo/{rel}"), rel, size, 0)
    }

    fn assembler(format: OutputFormat) -> Assembler {
        let config = DigestConfig::builder()
            .output_format(format)
            .include_summary(false)
            .include_tree(false)
            .build()
            .unwrap();
        Assembler::new(&config).unwrap()
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let err = assembler(OutputFormat::Text)
            .assemble(&[file("a.rs", 1)], &[], &AssemblyInput::new("repo"))
            .unwrap_err();
        assert!(matches!(err, DigestError::InconsistentInput { .. }));
    }

    #[test]
    fn test_more_files_than_scanned_is_error() {
        let statistics = TraversalStatistics::new();
        let input = AssemblyInput::new("repo").with_statistics(&statistics);
        let result = assembler(OutputFormat::Text).assemble(
            &[file("a.rs", 1)],
            &[ContentResult::text("a".into(), 1)],
            &input,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_text_chunks_have_headers() {
        let artifact = assembler(OutputFormat::Text)
            .assemble(
                &[file("src/lib.rs", 12), file("README.md", 5)],
                &[
                    ContentResult::text("fn main() {}\n".into(), 12),
                    ContentResult::text("hello".into(), 5),
                ],
                &AssemblyInput::new("repo"),
            )
            .unwrap();

        assert_eq!(
            artifact.output.as_text().unwrap(),
            "--- FILE: src/lib.rs (Rust, 12 B, ~4 tokens) ---\nfn main() {}\n\n---\n\n\
             --- FILE: README.md (Markdown, 5 B, ~2 tokens) ---\nhello"
        );
        assert_eq!(artifact.estimated_tokens(), 6);
    }

    #[test]
    fn test_markdown_fences_with_language() {
        let mut content = ContentResult::text("let s = \"```\";".into(), 14);
        content.redaction_applied = true;
        let artifact = assembler(OutputFormat::Markdown)
            .assemble(&[file("a.rs", 14)], &[content], &AssemblyInput::new("repo"))
            .unwrap();

        let text = artifact.output.as_text().unwrap();
        assert!(text.starts_with("## a.rs\n\n_Rust, 14 B, ~4 tokens, redacted_\n\n````rust\n"));
        assert!(text.ends_with("\n````"));
    }

    #[test]
    fn test_json_shape() {
        let config = DigestConfig::builder()
            .output_format(OutputFormat::Json)
            .build()
            .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let artifact = Assembler::new(&config)
            .unwrap()
            .assemble(
                &[file("a.py", 3)],
                &[ContentResult::text("x=1".into(), 3)],
                &AssemblyInput::new("repo").with_generated_at(at),
            )
            .unwrap();

        let value = artifact.output.as_json().unwrap();
        assert_eq!(value["summary"]["fileCount"], 1);
        assert_eq!(value["summary"]["source"]["label"], "repo");
        assert_eq!(value["tree"], "repo/\n└── a.py\n");
        assert_eq!(value["files"][0]["path"], "a.py");
        assert_eq!(value["files"][0]["kind"], "text");
        assert_eq!(value["files"][0]["content"], "x=1");
    }

    #[test]
    fn test_minimal_tree_uses_selected_files() {
        let config = DigestConfig::builder()
            .include_summary(false)
            .tree_mode(TreeMode::Minimal)
            .build()
            .unwrap();
        let scanned = vec![file("a.rs", 1), file("b/c.rs", 1)];
        let input = AssemblyInput::new("repo").with_scanned(&scanned);
        let artifact = Assembler::new(&config)
            .unwrap()
            .assemble(&scanned[..1], &[ContentResult::text("a".into(), 1)], &input)
            .unwrap();

        assert_eq!(artifact.tree.as_deref(), Some("repo/\n└── a.rs\n"));
    }

    #[test]
    fn test_full_tree_uses_scanned_files() {
        let config = DigestConfig::builder().include_summary(false).build().unwrap();
        let scanned = vec![file("a.rs", 1), file("b/c.rs", 1)];
        let input = AssemblyInput::new("repo").with_scanned(&scanned);
        let artifact = Assembler::new(&config)
            .unwrap()
            .assemble(&scanned[..1], &[ContentResult::text("a".into(), 1)], &input)
            .unwrap();

        assert_eq!(
            artifact.tree.as_deref(),
            Some("repo/\n├── a.rs\n└── b/\n    └── c.rs\n")
        );
        let text = artifact.output.as_text().unwrap();
        assert!(text.starts_with("Directory tree:\nrepo/\n"));
        assert_eq!(artifact.file_chunks_from_output().unwrap().len(), 1);
    }

    #[test]
    fn test_chunks_survive_separator_in_body() {
        let config = DigestConfig::builder().include_tree(false).build().unwrap();
        let assembler = Assembler::new(&config).unwrap();
        let files = [file("README.md", 30), file("a.rs", 8)];
        let contents = [
            ContentResult::text("# Title\n\nintro\n\n---\n\nmore\n".into(), 30),
            ContentResult::text("fn a() {}".into(), 8),
        ];
        let artifact = assembler
            .assemble(&files, &contents, &AssemblyInput::new("repo"))
            .unwrap();

        let chunks = artifact.file_chunks_from_output().unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with("intro\n\n---\n\nmore"));
        assert!(chunks[1].starts_with("--- FILE: a.rs"));
    }
}
