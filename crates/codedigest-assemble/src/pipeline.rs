//! End-to-end digest pipeline: scan, select, extract, estimate, assemble.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use codedigest_content::ContentExtractor;
use codedigest_core::{
    ContentKind, DigestConfig, DigestError, DigestWarning, FileDescriptor, ProgressEvent,
    ProgressReporter, SourceInfo, TraversalStatistics,
};
use codedigest_scan::DigestScanner;
use codedigest_tokens::TokenEstimator;

use crate::artifact::DigestArtifact;
use crate::assembler::{Assembler, AssemblyInput};

/// Everything one digest run needs.
#[derive(Debug, Clone)]
pub struct DigestRequest {
    pub root: PathBuf,
    pub config: DigestConfig,
    pub source: SourceInfo,
    /// Relative paths to keep from the scan; `None` keeps everything.
    pub selection: Option<Vec<String>>,
    pub cancel: CancellationToken,
}

impl DigestRequest {
    pub fn new(root: impl Into<PathBuf>, config: DigestConfig) -> Self {
        Self {
            root: root.into(),
            config,
            source: SourceInfo::default(),
            selection: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.source = source;
        self
    }

    pub fn with_selection(mut self, selection: Vec<String>) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum DigestStatus {
    /// Every selected file made it into the digest.
    Complete,
    /// A limit cut files or bytes.
    Truncated,
    /// Cancelled; whatever finished is kept.
    Cancelled,
    /// Nothing was selected.
    Empty,
}

/// Result of [`DigestPipeline::run`].
#[derive(Debug, Clone)]
pub struct DigestOutcome {
    /// The digest; `None` when nothing was extracted.
    pub artifact: Option<DigestArtifact>,
    pub statistics: TraversalStatistics,
    /// Traversal, extraction and redaction warnings.
    pub warnings: Vec<DigestWarning>,
    pub status: DigestStatus,
}

/// Runs every stage with one shared progress channel.
#[derive(Debug, Clone, Default)]
pub struct DigestPipeline {
    progress: ProgressReporter,
}

impl DigestPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reporter(progress: ProgressReporter) -> Self {
        Self { progress }
    }

    /// Progress from all phases.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    pub fn run(&self, request: DigestRequest) -> Result<DigestOutcome, DigestError> {
        let start = Instant::now();
        let DigestRequest {
            root,
            config,
            source,
            selection,
            cancel,
        } = request;

        config.validate()?;
        let estimator = TokenEstimator::from_config(&config)?;

        let scanner = DigestScanner::with_reporter(self.progress.clone());
        let scan = scanner.scan_with_cancel(&root, &config, &cancel)?;
        let statistics = scan.statistics;
        let mut warnings = statistics.warnings.clone();

        let mut files = match &selection {
            Some(selected) => select(&scan.files, selected),
            None => scan.files.clone(),
        };
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let extractor = ContentExtractor::with_reporter(&config, self.progress.clone());
        let batch = extractor.extract_all(&files, &cancel);
        files.truncate(batch.results.len());
        warnings.extend(batch.warnings.iter().cloned());

        let cancelled = statistics.cancelled || batch.cancelled;
        let cut_short = batch
            .results
            .iter()
            .zip(&files)
            .any(|(result, file)| {
                result.kind == ContentKind::Text && result.bytes_read < file.size
            });

        let status = if cancelled {
            DigestStatus::Cancelled
        } else if files.is_empty() {
            DigestStatus::Empty
        } else if statistics.limits_hit() || cut_short {
            DigestStatus::Truncated
        } else {
            DigestStatus::Complete
        };

        let artifact = if files.is_empty() {
            None
        } else {
            let root_label = scan
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| scan.root.display().to_string());
            let input = AssemblyInput::new(root_label)
                .with_source(source)
                .with_statistics(&statistics)
                .with_scanned(&scan.files)
                .with_extra_warnings(batch.warnings.len());
            let assembler = Assembler::with_estimator(&config, estimator, self.progress.clone());
            Some(assembler.assemble(&files, &batch.results, &input)?)
        };

        info!(
            status = %status,
            files = files.len(),
            warnings = warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Digest run finished"
        );

        Ok(DigestOutcome {
            artifact,
            statistics,
            warnings,
            status,
        })
    }
}

/// Keep the scanned files named in `selected`, in scan order.
fn select(scanned: &[FileDescriptor], selected: &[String]) -> Vec<FileDescriptor> {
    let wanted: HashSet<String> = selected.iter().map(|p| normalize(p)).collect();
    let files: Vec<_> = scanned
        .iter()
        .filter(|f| wanted.contains(f.relative_path.as_str()))
        .cloned()
        .collect();

    if files.len() < wanted.len() {
        warn!(
            requested = wanted.len(),
            matched = files.len(),
            "Some selected paths were not produced by the scan"
        );
    }
    files
}

fn normalize(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    path.trim_start_matches("./").trim_matches('/').to_string()
}
