//! codedigest - turn a source tree into a single LLM-ready digest.
//!
//! Usage:
//!   codedigest [PATH]            Write a digest of PATH to stdout
//!   codedigest digest [PATH]     Same, with explicit subcommand
//!   codedigest scan [PATH]       Traversal statistics only
//!   codedigest tokens FILES...   Token estimates per file
//!   codedigest config [PATH]     Print the effective configuration
//!   codedigest --help            Show help

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use strum::IntoEnumIterator;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use codedigest_assemble::{DigestOutcome, DigestPipeline, DigestRequest, DigestStatus};
use codedigest_content::ContentExtractor;
use codedigest_core::{
    BinaryPolicy, DigestConfig, DigestStats, OutputFormat, ProgressMode, SkipReason, SourceInfo,
    TreeMode, extension_of,
};
use codedigest_scan::DigestScanner;
use codedigest_tokens::TokenEstimator;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "CODEDIGEST_LOG";

/// Config file looked up in the root directory.
const LOCAL_CONFIG: &str = "codedigest.toml";

#[derive(Parser)]
#[command(
    name = "codedigest",
    version,
    about = "Turn a source tree into a single LLM-ready digest",
    long_about = "codedigest walks a directory, honors .gitignore-style rules and size limits, \
                  redacts secrets, and writes the selected files as one text, markdown or \
                  JSON document with a tree, a summary and token estimates.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Directory to digest (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    #[command(flatten)]
    digest: DigestArgs,

    /// Configuration file (defaults to codedigest.toml in the root, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Build a digest
    Digest {
        /// Directory to digest
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        args: DigestArgs,
    },

    /// Scan only and report what would be selected
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Report format
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Estimate tokens for individual files
    Tokens {
        /// Files to estimate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Token model (default, gpt, claude, llama, gemini, code, custom:<divisor>)
        #[arg(short = 'm', long)]
        token_model: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Root whose codedigest.toml should be considered
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Selection limits and filters shared by `digest` and `scan`.
#[derive(Args, Clone, Default)]
struct LimitArgs {
    /// Maximum number of files
    #[arg(long)]
    max_files: Option<usize>,

    /// Maximum size of a single file (e.g. "512KB", "1MB")
    #[arg(long)]
    max_file_size: Option<String>,

    /// Maximum total size of all files (e.g. "50MB")
    #[arg(long)]
    max_total_size: Option<String>,

    /// Maximum directory depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Only include files matching these globs
    #[arg(short, long)]
    include: Vec<String>,

    /// Exclude files matching these globs
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Activate a preset (virtual folder) from the configuration
    #[arg(long)]
    preset: Vec<String>,

    /// Ignore .gitignore and .digestignore files
    #[arg(long)]
    no_gitignore: bool,
}

#[derive(Args, Clone, Default)]
struct DigestArgs {
    #[command(flatten)]
    limits: LimitArgs,

    /// Output format
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// How binary files are represented
    #[arg(long)]
    binary: Option<BinaryPolicy>,

    /// Token model (default, gpt, claude, llama, gemini, code, custom:<divisor>)
    #[arg(short = 'm', long)]
    token_model: Option<String>,

    /// Disable secret redaction
    #[arg(long)]
    no_redact: bool,

    /// Directory tree rendering
    #[arg(long)]
    tree: Option<TreeChoice>,

    /// Omit the summary block
    #[arg(long)]
    no_summary: bool,

    /// File listing the relative paths to include, one per line ("-" for stdin)
    #[arg(long)]
    select: Option<PathBuf>,

    /// Label shown in the summary
    #[arg(long)]
    source_label: Option<String>,

    /// Remote URL shown in the summary
    #[arg(long)]
    source_url: Option<String>,

    /// Branch, tag or commit shown in the summary
    #[arg(long)]
    source_revision: Option<String>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TreeChoice {
    Full,
    Minimal,
    None,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ReportFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Command::Digest { path, args }) => run_digest(&path, cli.config.as_deref(), &args),
        Some(Command::Scan {
            path,
            format,
            limits,
        }) => run_scan(&path, cli.config.as_deref(), &limits, format),
        Some(Command::Tokens { files, token_model }) => {
            run_tokens(&files, cli.config.as_deref(), token_model)
        }
        Some(Command::Config { path }) => run_config(&path, cli.config.as_deref()),
        None => run_digest(&cli.path, cli.config.as_deref(), &cli.digest),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Run the full pipeline and write the digest.
fn run_digest(path: &Path, config_path: Option<&Path>, args: &DigestArgs) -> Result<()> {
    let mut config = load_config(path, config_path)?;
    apply_limits(&mut config, &args.limits)?;
    apply_digest_args(&mut config, args);
    config.validate().context("Invalid configuration")?;

    let source = SourceInfo {
        label: args.source_label.clone(),
        url: args.source_url.clone(),
        revision: args.source_revision.clone(),
    };
    let mut request = DigestRequest::new(path, config).with_source(source);
    if let Some(list) = &args.select {
        request = request.with_selection(read_selection(list)?);
    }

    let pipeline = DigestPipeline::new();
    let reporter = (!args.quiet).then(|| spawn_progress_printer(&pipeline));
    let outcome = pipeline.run(request).context("Digest failed")?;
    drop(pipeline);
    if let Some(handle) = reporter {
        let _ = handle.join();
    }

    write_outcome(&outcome, args.output.as_deref(), args.quiet)
}

fn write_outcome(outcome: &DigestOutcome, output: Option<&Path>, quiet: bool) -> Result<()> {
    let Some(artifact) = &outcome.artifact else {
        match outcome.status {
            DigestStatus::Cancelled => bail!("Digest cancelled before any file was read"),
            _ => {
                eprintln!("No files selected; nothing to write.");
                return Ok(());
            }
        }
    };

    let content = artifact.output.render()?;
    match output {
        Some(output_path) => {
            fs::write(output_path, &content)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }

    if !quiet {
        eprintln!(
            "{} files, {}, ~{} tokens ({})",
            artifact.file_count,
            format_size(artifact.summary.total_bytes),
            artifact.estimated_tokens(),
            outcome.status
        );
        if let Some(output_path) = output {
            eprintln!("Wrote {}", output_path.display());
        }
        if !outcome.warnings.is_empty() {
            eprintln!("{} warning(s)", outcome.warnings.len());
            for warning in &outcome.warnings {
                tracing::debug!(kind = ?warning.kind, path = %warning.path.display(), "{}", warning.message);
            }
        }
    }

    Ok(())
}

/// Print phase boundaries to stderr until the pipeline is dropped.
fn spawn_progress_printer(pipeline: &DigestPipeline) -> thread::JoinHandle<()> {
    let mut rx = pipeline.subscribe();
    thread::spawn(move || {
        loop {
            match rx.blocking_recv() {
                Ok(event) if event.mode != ProgressMode::Progress => {
                    if let Some(message) = event.message {
                        eprintln!("{message}");
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Run a scan and show what would be selected.
fn run_scan(
    path: &Path,
    config_path: Option<&Path>,
    limits: &LimitArgs,
    format: ReportFormat,
) -> Result<()> {
    let mut config = load_config(path, config_path)?;
    apply_limits(&mut config, limits)?;

    let outcome = DigestScanner::new()
        .scan(path, &config)
        .context("Scan failed")?;
    let stats = DigestStats::from_descriptors(&outcome.files);
    let statistics = &outcome.statistics;

    match format {
        ReportFormat::Text => {
            println!();
            println!("{}", "─".repeat(60));
            println!(" {} - {}", outcome.root.display(), format_size(stats.total_size));
            println!(
                " {} files selected of {} examined, {} directories",
                statistics.files_emitted, statistics.files_examined, statistics.directories_scanned
            );
            println!(" Scanned in {:.2}s", statistics.elapsed.as_secs_f64());
            println!("{}", "─".repeat(60));
            println!();

            println!(" Languages:");
            let mut languages: Vec<_> = stats.languages.iter().collect();
            languages.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (language, count) in languages {
                println!("   {language:<20} {count:>8}");
            }
            println!();

            println!(" Sizes:");
            for (bucket, count) in &stats.size_buckets {
                println!("   {:<20} {count:>8}", bucket.to_string());
            }
            if let Some((largest, size)) = &stats.largest_file {
                println!("   largest: {} ({})", largest.display(), format_size(*size));
            }
            println!();

            println!(" Skipped:");
            for reason in SkipReason::iter() {
                let count = statistics.skipped(reason);
                if count > 0 {
                    println!("   {:<20} {count:>8}", reason.to_string());
                }
            }
            if statistics.directories_pruned > 0 {
                println!("   {:<20} {:>8}", "pruned directories", statistics.directories_pruned);
            }
            if statistics.directories_too_deep > 0 {
                println!("   {:<20} {:>8}", "  of which too deep", statistics.directories_too_deep);
            }

            if statistics.has_warnings() {
                println!();
                println!("{} warning(s) during scan", statistics.warnings.len());
                for warning in &statistics.warnings {
                    println!("   {}", warning.message);
                }
            }
        }
        ReportFormat::Json => {
            let report = serde_json::json!({
                "root": outcome.root,
                "statistics": statistics,
                "stats": stats,
                "files": outcome.files.iter().map(|f| f.relative_path.as_str()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Estimate tokens for individual files.
fn run_tokens(files: &[PathBuf], config_path: Option<&Path>, model: Option<String>) -> Result<()> {
    let mut config = load_config(Path::new("."), config_path)?;
    if let Some(model) = model {
        config.token_model = model;
    }
    let estimator = TokenEstimator::from_config(&config)?;
    let extractor = ContentExtractor::new(&config);

    let mut total = 0;
    for path in files {
        let meta = fs::metadata(path).with_context(|| format!("Cannot read {}", path.display()))?;
        if !meta.is_file() {
            bail!("{} is not a file", path.display());
        }
        let ext = extension_of(path);
        let content = extractor.extract_content(path, &ext, config.max_file_size.min(meta.len()));
        if let Some(error) = &content.error {
            return Err(eyre!("Cannot read {}: {error}", path.display()));
        }
        let tokens = estimator.estimate(&content.text, Some(ext.as_str()));
        total += tokens;
        println!("{tokens:>10}  {}", path.display());
    }
    if files.len() > 1 {
        println!("{total:>10}  total ({})", estimator.model());
    }

    Ok(())
}

/// Print the configuration the other commands would use.
fn run_config(path: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(path, config_path)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Resolve the configuration: explicit file, then `codedigest.toml` in the
/// root, then the user config dir, then defaults.
fn load_config(root: &Path, explicit: Option<&Path>) -> Result<DigestConfig> {
    let candidate = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let local = root.join(LOCAL_CONFIG);
            let user = dirs::config_dir().map(|d| d.join("codedigest").join("config.toml"));
            std::iter::once(local).chain(user).find(|p| p.is_file())
        }
    };

    let Some(path) = candidate else {
        return Ok(DigestConfig::default());
    };
    tracing::debug!(path = %path.display(), "Loading configuration");
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: DigestConfig = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
}

fn apply_limits(config: &mut DigestConfig, limits: &LimitArgs) -> Result<()> {
    if let Some(n) = limits.max_files {
        config.max_files = n;
    }
    if let Some(size) = &limits.max_file_size {
        config.max_file_size = parse_size(size)?;
    }
    if let Some(size) = &limits.max_total_size {
        config.max_total_size_bytes = parse_size(size)?;
    }
    if let Some(depth) = limits.max_depth {
        config.max_directory_depth = depth;
    }
    config.include_patterns.extend(limits.include.iter().cloned());
    config.exclude_patterns.extend(limits.exclude.iter().cloned());
    config.active_presets.extend(limits.preset.iter().cloned());
    if limits.no_gitignore {
        config.respect_gitignore = false;
    }
    Ok(())
}

fn apply_digest_args(config: &mut DigestConfig, args: &DigestArgs) {
    if let Some(format) = args.format {
        config.output_format = format;
    }
    if let Some(policy) = args.binary {
        config.binary_policy = policy;
    }
    if let Some(model) = &args.token_model {
        config.token_model = model.clone();
    }
    if args.no_redact {
        config.redaction_enabled = false;
    }
    match args.tree {
        Some(TreeChoice::Full) => {
            config.include_tree = true;
            config.tree_mode = TreeMode::Full;
        }
        Some(TreeChoice::Minimal) => {
            config.include_tree = true;
            config.tree_mode = TreeMode::Minimal;
        }
        Some(TreeChoice::None) => config.include_tree = false,
        None => {}
    }
    if args.no_summary {
        config.include_summary = false;
    }
}

/// Read a selection list: one relative path per line, `#` comments allowed.
fn read_selection(path: &Path) -> Result<Vec<String>> {
    let text = if path == Path::new("-") {
        io::read_to_string(io::stdin()).context("Failed to read selection from stdin")?
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read selection {}", path.display()))?
    };
    Ok(parse_selection(&text))
}

fn parse_selection(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "512", "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(digits_end);
    let num: f64 = num
        .parse()
        .with_context(|| format!("Invalid size '{s}'"))?;

    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        other => bail!("Unknown size unit '{other}' in '{s}'"),
    };

    Ok((num * multiplier as f64) as u64)
}
