//! Per-file content extraction.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codedigest_core::{
    BinaryPolicy, ContentKind, ContentResult, DigestConfig, DigestWarning, FileDescriptor,
    Operation, OutputFormat, ProgressReporter,
};

use crate::classify::{SNIFF_BYTES, classify};
use crate::decode::StreamDecoder;
use crate::notebook::{NotebookOptions, render_notebook};
use crate::redact::Redactor;

/// Results of extracting a batch of files.
#[derive(Debug, Clone, Default)]
pub struct ExtractionBatch {
    /// One result per input file, in input order. When cancelled, only the
    /// leading files that completed are present.
    pub results: Vec<ContentResult>,
    /// Per-file failures and redaction warnings.
    pub warnings: Vec<DigestWarning>,
    /// Total bytes read from disk.
    pub bytes_read: u64,
    /// Extraction stopped early.
    pub cancelled: bool,
}

/// Reads, classifies and redacts file contents.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    config: DigestConfig,
    redactor: Option<Redactor>,
    progress: ProgressReporter,
}

impl ContentExtractor {
    /// Create an extractor for one run.
    pub fn new(config: &DigestConfig) -> Self {
        Self::with_reporter(config, ProgressReporter::new())
    }

    /// Create an extractor that reports on an existing channel.
    pub fn with_reporter(config: &DigestConfig, progress: ProgressReporter) -> Self {
        let redactor = config
            .redaction_enabled
            .then(|| Redactor::from_config(config));
        Self {
            config: config.clone(),
            redactor,
            progress,
        }
    }

    /// The redactor in use, if redaction is enabled.
    pub fn redactor(&self) -> Option<&Redactor> {
        self.redactor.as_ref()
    }

    /// Extract one file, reading at most `max_bytes`.
    ///
    /// Never fails: read errors become an `ExtractionFailed` placeholder.
    pub fn extract_content(&self, path: &Path, extension: &str, max_bytes: u64) -> ContentResult {
        match self.try_extract(path, extension, max_bytes) {
            Ok(result) => result,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Extraction failed");
                ContentResult::failed(&path.display().to_string(), err.to_string())
            }
        }
    }

    /// Extract a scanned file using its scanned size as the read budget.
    pub fn extract_file(&self, file: &FileDescriptor) -> ContentResult {
        self.extract_content(&file.path, &file.extension(), file.size)
    }

    /// Extract every file on a bounded pool, preserving input order.
    ///
    /// Read budgets are assigned up front so the total never exceeds
    /// `maxTotalSizeBytes`. Cancellation is checked before each file.
    pub fn extract_all(&self, files: &[FileDescriptor], cancel: &CancellationToken) -> ExtractionBatch {
        let mut remaining = self.config.max_total_size_bytes;
        let budgets: Vec<u64> = files
            .iter()
            .map(|f| {
                let budget = f.size.min(remaining);
                remaining -= budget;
                budget
            })
            .collect();

        info!(files = files.len(), "Extracting content");
        self.progress
            .start(Operation::Extract, format!("Reading {} files", files.len()));

        let done = AtomicUsize::new(0);
        let total = files.len().max(1);
        let extract_one = |(file, budget): (&FileDescriptor, &u64)| -> Option<ContentResult> {
            if cancel.is_cancelled() {
                return None;
            }
            let result = self.extract_content(&file.path, &file.extension(), *budget);
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            let interval = self.config.progress_interval.max(1);
            if n % interval == 0 || n == files.len() {
                self.progress.progress(
                    Operation::Extract,
                    format!("{n}/{} files read", files.len()),
                    Some(n as f32 * 100.0 / total as f32),
                );
            }
            Some(result)
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.read_concurrency)
            .thread_name(|i| format!("codedigest-read-{i}"))
            .build();
        let slots: Vec<Option<ContentResult>> = match pool {
            Ok(pool) => pool.install(|| files.par_iter().zip(budgets.par_iter()).map(extract_one).collect()),
            Err(err) => {
                warn!(error = %err, "Could not build read pool, reading sequentially");
                files.iter().zip(budgets.iter()).map(extract_one).collect()
            }
        };

        let mut batch = ExtractionBatch::default();
        if let Some(redactor) = &self.redactor {
            batch.warnings.extend(redactor.warnings().iter().cloned());
        }

        for (file, slot) in files.iter().zip(slots) {
            let Some(result) = slot else {
                batch.cancelled = true;
                break;
            };
            if let Some(error) = &result.error {
                batch
                    .warnings
                    .push(DigestWarning::extraction(&file.path, error.clone()));
            }
            batch.bytes_read += result.bytes_read;
            batch.results.push(result);
        }
        if batch.cancelled {
            batch
                .warnings
                .push(DigestWarning::cancelled("Extraction cancelled; results are partial"));
        }

        self.progress.end(
            Operation::Extract,
            format!("{} files read", batch.results.len()),
        );
        batch
    }

    fn try_extract(&self, path: &Path, extension: &str, max_bytes: u64) -> io::Result<ContentResult> {
        let mut reader = File::open(path)?.take(max_bytes);

        let mut head = Vec::with_capacity(SNIFF_BYTES.min(max_bytes as usize));
        (&mut reader).take(SNIFF_BYTES as u64).read_to_end(&mut head)?;

        if classify(&head).is_binary() {
            debug!(path = %path.display(), "Classified as binary");
            return self.binary_content(head, reader, max_bytes);
        }

        let mut text = String::new();
        let mut decoder = StreamDecoder::new();
        decoder.push(&head, &mut text);
        let mut bytes_read = head.len() as u64;

        if max_bytes > self.config.streaming_threshold_bytes {
            let mut chunk = vec![0u8; self.config.read_chunk_bytes];
            loop {
                let n = reader.read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                decoder.push(&chunk[..n], &mut text);
                bytes_read += n as u64;
            }
        } else {
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest)?;
            decoder.push(&rest, &mut text);
            bytes_read += rest.len() as u64;
        }
        decoder.finish(&mut text);

        let mut kind = ContentKind::Text;
        if extension.eq_ignore_ascii_case("ipynb") {
            match render_notebook(&text, &self.notebook_options()) {
                Some(rendered) => {
                    text = rendered;
                    kind = ContentKind::Notebook;
                }
                None => debug!(path = %path.display(), "Malformed notebook, using plain text"),
            }
        }

        let mut result = ContentResult::text(text, bytes_read);
        result.kind = kind;
        if let Some(redactor) = &self.redactor {
            let outcome = redactor.redact(&result.text);
            if outcome.applied {
                debug!(path = %path.display(), matches = outcome.matches, "Redacted");
                result.text = outcome.text;
                result.redaction_applied = true;
            }
        }
        Ok(result)
    }

    fn binary_content(
        &self,
        head: Vec<u8>,
        mut reader: impl Read,
        max_bytes: u64,
    ) -> io::Result<ContentResult> {
        let sniffed = head.len() as u64;
        let result = match self.config.binary_policy {
            BinaryPolicy::Skip => ContentResult::binary(
                "[binary file omitted]".to_string(),
                ContentKind::BinarySkipped,
                sniffed,
            ),
            BinaryPolicy::IncludePlaceholder => ContentResult::binary(
                format!("[binary file, {max_bytes} bytes]"),
                ContentKind::BinaryPlaceholder,
                sniffed,
            ),
            BinaryPolicy::IncludeBase64 => {
                let mut bytes = head;
                reader.read_to_end(&mut bytes)?;
                let payload = STANDARD.encode(&bytes);
                ContentResult::binary(
                    fence_base64(&payload, self.config.output_format),
                    ContentKind::BinaryBase64,
                    bytes.len() as u64,
                )
            }
        };
        Ok(result)
    }

    fn notebook_options(&self) -> NotebookOptions {
        NotebookOptions {
            include_outputs: self.config.notebook_include_outputs,
            include_non_text_outputs: self.config.notebook_include_non_text_outputs,
            output_max_bytes: self.config.notebook_output_max_bytes,
        }
    }
}

/// Wrap a base64 payload for the target format.
pub fn fence_base64(payload: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Markdown => format!("```base64\n{payload}\n```"),
        OutputFormat::Text => format!("--- BEGIN BASE64 ---\n{payload}\n--- END BASE64 ---"),
        OutputFormat::Json => payload.to_string(),
    }
}
