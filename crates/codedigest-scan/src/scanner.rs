//! JWalk-based traversal with layered ignore rules and limits.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use jwalk::{Parallelism, WalkDirGeneric};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codedigest_core::{
    DigestConfig, DigestError, DigestWarning, FileDescriptor, Operation, ProgressEvent,
    ProgressReporter, SkipReason, TraversalStatistics, WarningKind,
};

use crate::cache::{HydratedListing, ListingCache, ListingKey};
use crate::filter::SelectionFilter;
use crate::rules::{DirectoryAction, RuleStack};

/// Result of a traversal.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Canonical root that was walked.
    pub root: PathBuf,
    /// Emitted files in depth-first lexicographic order.
    pub files: Vec<FileDescriptor>,
    /// Symbolic links encountered (recorded, never followed).
    pub symlinks: Vec<FileDescriptor>,
    /// Counters and warnings.
    pub statistics: TraversalStatistics,
}

impl ScanOutcome {
    /// Whether the scan was cut short.
    pub fn is_partial(&self) -> bool {
        self.statistics.cancelled
    }
}

/// Per-directory state threaded through jwalk.
#[derive(Debug, Clone, Default)]
struct DirState {
    rules: RuleStack,
    /// Child directories walked in excluded mode, keyed by name.
    excluded_children: Arc<HashMap<OsString, usize>>,
}

/// Decision attached to each entry while its parent is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum EntryMark {
    #[default]
    Keep,
    Ignored,
    TooDeep,
}

type Walker = WalkDirGeneric<(DirState, EntryMark)>;

/// Traversal engine.
///
/// Holds a progress reporter and a listing cache; every scan is otherwise
/// independent.
pub struct DigestScanner {
    progress: ProgressReporter,
    cache: Arc<ListingCache>,
}

impl DigestScanner {
    /// Create a new scanner with its own progress channel.
    pub fn new() -> Self {
        Self::with_reporter(ProgressReporter::new())
    }

    /// Create a scanner that reports on an existing channel.
    pub fn with_reporter(progress: ProgressReporter) -> Self {
        Self {
            progress,
            cache: Arc::new(ListingCache::new()),
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// The listing cache used by [`Self::list_directory`].
    pub fn cache(&self) -> &ListingCache {
        &self.cache
    }

    /// Walk `root` without a cancellation handle.
    pub fn scan(&self, root: &Path, config: &DigestConfig) -> Result<ScanOutcome, DigestError> {
        self.scan_with_cancel(root, config, &CancellationToken::new())
    }

    /// Walk `root`, stopping between entries once `cancel` fires.
    pub fn scan_with_cancel(
        &self,
        root: &Path,
        config: &DigestConfig,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome, DigestError> {
        let start = Instant::now();
        config.validate()?;
        let root = canonical_root(root)?;
        let filter = SelectionFilter::from_config(config)?;
        let base_rules = RuleStack::from_patterns(&config.ignore_patterns)?;

        let mut outcome = ScanOutcome {
            root: root.clone(),
            ..Default::default()
        };

        if cancel.is_cancelled() {
            mark_cancelled(&mut outcome.statistics);
            return Ok(outcome);
        }

        info!(root = %root.display(), "Starting scan");
        self.progress.start(Operation::Scan, format!("Scanning {}", root.display()));

        let ignore_problems = Arc::new(DashMap::new());
        let walker = build_walker(&root, config, base_rules, Arc::clone(&ignore_problems), cancel.clone());
        let stats = &mut outcome.statistics;
        let mut entries_seen: usize = 0;

        for entry_result in walker {
            if cancel.is_cancelled() {
                mark_cancelled(stats);
                break;
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    warn!(path = %path.display(), error = %err, "Traversal error");
                    stats.warn(DigestWarning::new(path, err.to_string(), WarningKind::ReadError));
                    continue;
                }
            };

            if entry.depth == 0 {
                continue;
            }

            entries_seen += 1;
            if config.progress_interval > 0 && entries_seen % config.progress_interval == 0 {
                self.progress.progress(
                    Operation::Scan,
                    format!("{} files examined, {} emitted", stats.files_examined, stats.files_emitted),
                    None,
                );
            }

            let path = entry.path();
            let relative = relative_path(&root, &path);
            let depth = entry.depth - 1;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                match entry.client_state {
                    EntryMark::Keep => stats.directories_scanned += 1,
                    EntryMark::Ignored => {
                        debug!(path = %relative, "Pruned ignored directory");
                        stats.directories_pruned += 1;
                    }
                    EntryMark::TooDeep => {
                        stats.directories_pruned += 1;
                        stats.directories_too_deep += 1;
                        stats.warn(DigestWarning::new(
                            &path,
                            format!(
                                "Not descending into {relative}: deeper than maxDirectoryDepth ({})",
                                config.max_directory_depth
                            ),
                            WarningKind::DirectoryPruned,
                        ));
                    }
                }
                continue;
            }

            if entry.client_state == EntryMark::Ignored {
                debug!(path = %relative, "Ignored");
                stats.record_candidate(0);
                stats.record_skip(SkipReason::Ignore);
                continue;
            }

            if file_type.is_symlink() {
                stats.record_candidate(0);
                if stats.record_skip(SkipReason::Symlink) {
                    stats.warn(DigestWarning::new(
                        &path,
                        "Symbolic links are recorded but not followed",
                        WarningKind::Symlink,
                    ));
                }
                outcome.symlinks.push(FileDescriptor::symlink(&path, relative, depth));
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(err) => {
                    stats.record_candidate(0);
                    stats.record_skip(SkipReason::Error);
                    stats.warn(DigestWarning::new(&path, err.to_string(), WarningKind::MetadataError));
                    continue;
                }
            };
            stats.record_candidate(size);

            if let Some(reason) = check_limits(&filter, config, stats, &relative, depth, size) {
                debug!(path = %relative, %reason, "Skipped");
                if stats.record_skip(reason)
                    && let Some(message) = limit_message(reason, config)
                {
                    stats.warn(DigestWarning::limit(message));
                }
                continue;
            }

            stats.record_emitted(size);
            outcome.files.push(FileDescriptor::file(&path, relative, size, depth));
        }

        let mut problems: Vec<(PathBuf, Vec<String>)> = ignore_problems
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        problems.sort();
        for (path, messages) in problems {
            for message in messages {
                warn!(path = %path.display(), %message, "Ignore file problem");
                stats.warn(DigestWarning::new(&path, message, WarningKind::IgnoreFile));
            }
        }

        stats.elapsed = start.elapsed();
        info!(
            emitted = stats.files_emitted,
            skipped = stats.total_skipped(),
            elapsed_ms = stats.elapsed.as_millis() as u64,
            cancelled = stats.cancelled,
            "Scan finished"
        );
        self.progress.end(
            Operation::Scan,
            format!("{} files selected of {} examined", stats.files_emitted, stats.files_examined),
        );

        Ok(outcome)
    }

    /// Immediate children of `directory` after ignore rules, memoized.
    ///
    /// The returned listing has an empty selection set regardless of what
    /// earlier callers selected.
    pub fn list_directory(
        &self,
        root: &Path,
        directory: &Path,
        config: &DigestConfig,
    ) -> Result<HydratedListing, DigestError> {
        let root = canonical_root(root)?;
        let directory = directory
            .canonicalize()
            .map_err(|e| DigestError::io(directory, e))?;
        if !directory.is_dir() {
            return Err(DigestError::NotADirectory { path: directory });
        }
        if !directory.starts_with(&root) {
            return Err(DigestError::InconsistentInput {
                message: format!("{} is outside {}", directory.display(), root.display()),
            });
        }

        let key = ListingKey::new(directory, listing_fingerprint(&root, config));
        self.cache
            .hydrate(&key, |dir| read_listing(&root, dir, config))
    }
}

impl Default for DigestScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf, DigestError> {
    let root = root.canonicalize().map_err(|e| DigestError::io(root, e))?;
    if !root.is_dir() {
        return Err(DigestError::NotADirectory { path: root });
    }
    Ok(root)
}

fn mark_cancelled(stats: &mut TraversalStatistics) {
    if !stats.cancelled {
        stats.cancelled = true;
        stats.warn(DigestWarning::cancelled("Scan cancelled; results are partial"));
    }
}

fn build_walker(
    root: &Path,
    config: &DigestConfig,
    base_rules: RuleStack,
    problems: Arc<DashMap<PathBuf, Vec<String>>>,
    cancel: CancellationToken,
) -> Walker {
    let parallelism = match config.threads {
        0 => Parallelism::RayonDefaultPool {
            busy_timeout: Duration::from_millis(100),
        },
        n => Parallelism::RayonNewPool(n),
    };

    let root_path = root.to_path_buf();
    let ignore_file_names = if config.respect_gitignore {
        config.ignore_file_names.clone()
    } else {
        Vec::new()
    };
    let max_depth = config.max_directory_depth;

    Walker::new(root)
        .parallelism(parallelism)
        .sort(true)
        .skip_hidden(false)
        .follow_links(false)
        .min_depth(0)
        .process_read_dir(move |depth, path, state, children| {
            if depth.is_none() {
                return;
            }
            if cancel.is_cancelled() {
                children.clear();
                return;
            }

            let relative_dir = relative_path(&root_path, path);
            let inherited = if relative_dir.is_empty() {
                state.rules = base_rules.clone();
                None
            } else {
                path.file_name()
                    .and_then(|name| state.excluded_children.get(name).copied())
            };

            let (rules, load_problems) =
                state
                    .rules
                    .with_ignore_files(path, &relative_dir, &ignore_file_names);
            for (file, message) in load_problems {
                problems.entry(file).or_default().push(message);
            }

            let mut excluded_children = HashMap::new();
            for child in children.iter_mut().flatten() {
                let name = child.file_name.to_string_lossy();
                let relative = join_relative(&relative_dir, &name);

                if child.file_type.is_dir() {
                    match rules.directory_action(&relative, inherited) {
                        DirectoryAction::Prune => {
                            child.client_state = EntryMark::Ignored;
                            child.read_children_path = None;
                            continue;
                        }
                        DirectoryAction::DescendExcluded(idx) => {
                            excluded_children.insert(child.file_name.clone(), idx);
                        }
                        DirectoryAction::Descend => {}
                    }
                    // Files inside this directory sit at our depth == child.depth
                    if child.depth > max_depth.saturating_add(1) {
                        child.client_state = EntryMark::TooDeep;
                        child.read_children_path = None;
                    }
                } else if rules.evaluate(&relative, false, inherited).is_excluded() {
                    child.client_state = EntryMark::Ignored;
                }
            }

            state.rules = rules;
            state.excluded_children = Arc::new(excluded_children);
        })
}

/// First limit or filter that rejects a file, in traversal order.
fn check_limits(
    filter: &SelectionFilter,
    config: &DigestConfig,
    stats: &TraversalStatistics,
    relative: &str,
    depth: usize,
    size: u64,
) -> Option<SkipReason> {
    if !filter.accepts(relative) {
        return Some(SkipReason::Filter);
    }
    if depth > config.max_directory_depth {
        return Some(SkipReason::Depth);
    }
    if size > config.max_file_size {
        return Some(SkipReason::Size);
    }
    if stats.files_emitted >= config.max_files as u64 {
        return Some(SkipReason::MaxFiles);
    }
    if stats.bytes_emitted.saturating_add(size) > config.max_total_size_bytes {
        return Some(SkipReason::TotalLimit);
    }
    None
}

fn limit_message(reason: SkipReason, config: &DigestConfig) -> Option<String> {
    let message = match reason {
        SkipReason::Depth => format!(
            "Files deeper than maxDirectoryDepth ({}) were skipped",
            config.max_directory_depth
        ),
        SkipReason::Size => format!(
            "Files larger than maxFileSize ({} bytes) were skipped",
            config.max_file_size
        ),
        SkipReason::MaxFiles => format!(
            "maxFiles ({}) reached; remaining files were skipped",
            config.max_files
        ),
        SkipReason::TotalLimit => format!(
            "maxTotalSizeBytes ({} bytes) reached; files that did not fit were skipped",
            config.max_total_size_bytes
        ),
        _ => return None,
    };
    Some(message)
}

/// Read one directory level, applying ignore rules from the root down.
/// Hash of everything that shapes a filtered listing besides the directory.
fn listing_fingerprint(root: &Path, config: &DigestConfig) -> u64 {
    let mut hasher = DefaultHasher::new();
    root.hash(&mut hasher);
    config.ignore_patterns.hash(&mut hasher);
    config.respect_gitignore.hash(&mut hasher);
    if config.respect_gitignore {
        config.ignore_file_names.hash(&mut hasher);
    }
    hasher.finish()
}

fn read_listing(
    root: &Path,
    directory: &Path,
    config: &DigestConfig,
) -> Result<Vec<FileDescriptor>, DigestError> {
    let ignore_file_names: &[String] = if config.respect_gitignore {
        &config.ignore_file_names
    } else {
        &[]
    };

    let mut rules = RuleStack::from_patterns(&config.ignore_patterns)?;
    let mut inherited = None;
    let mut current = root.to_path_buf();
    let mut relative_dir = String::new();

    let below_root = directory.strip_prefix(root).unwrap_or(Path::new(""));
    let mut components = below_root.components();
    loop {
        (rules, _) = rules.with_ignore_files(&current, &relative_dir, ignore_file_names);
        let Some(component) = components.next() else {
            break;
        };
        let name = component.as_os_str().to_string_lossy();
        relative_dir = join_relative(&relative_dir, &name);
        current.push(component);

        match rules.directory_action(&relative_dir, inherited) {
            DirectoryAction::Prune => return Ok(Vec::new()),
            DirectoryAction::DescendExcluded(idx) => inherited = Some(idx),
            DirectoryAction::Descend => {}
        }
    }

    let depth = below_root.components().count();
    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(directory).map_err(|e| DigestError::io(directory, e))? {
        let dir_entry = dir_entry.map_err(|e| DigestError::io(directory, e))?;
        let file_type = dir_entry
            .file_type()
            .map_err(|e| DigestError::io(dir_entry.path(), e))?;
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        let relative = join_relative(&relative_dir, &name);
        let path = dir_entry.path();

        if file_type.is_dir() {
            if rules.directory_action(&relative, inherited) != DirectoryAction::Prune {
                entries.push(FileDescriptor::directory(path, relative, depth));
            }
            continue;
        }
        if rules.evaluate(&relative, false, inherited).is_excluded() {
            continue;
        }
        if file_type.is_symlink() {
            entries.push(FileDescriptor::symlink(path, relative, depth));
        } else {
            let size = dir_entry.metadata().map(|m| m.len()).unwrap_or(0);
            entries.push(FileDescriptor::file(path, relative, size, depth));
        }
    }

    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(entries)
}

/// `/`-separated path of `path` below `root`; empty for the root itself.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir(root.join("docs")).unwrap();

        fs::write(root.join("README.md"), "# readme").unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn a() {}").unwrap();
        fs::write(root.join("src/nested/deep.rs"), "fn deep() {}").unwrap();
        fs::write(root.join("docs/guide.md"), "guide").unwrap();

        temp
    }

    fn paths(outcome: &ScanOutcome) -> Vec<&str> {
        outcome.files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn test_basic_scan_is_sorted() {
        let temp = create_test_tree();
        let outcome = DigestScanner::new()
            .scan(temp.path(), &DigestConfig::default())
            .unwrap();

        assert_eq!(
            paths(&outcome),
            vec!["README.md", "docs/guide.md", "src/lib.rs", "src/nested/deep.rs"]
        );
        assert_eq!(outcome.statistics.files_emitted, 4);
        assert_eq!(outcome.statistics.directories_scanned, 3);
    }

    #[test]
    fn test_depths_start_at_zero() {
        let temp = create_test_tree();
        let outcome = DigestScanner::new()
            .scan(temp.path(), &DigestConfig::default())
            .unwrap();

        let depth_of = |rel: &str| outcome.files.iter().find(|f| f.relative_path == rel).unwrap().depth;
        assert_eq!(depth_of("README.md"), 0);
        assert_eq!(depth_of("src/lib.rs"), 1);
        assert_eq!(depth_of("src/nested/deep.rs"), 2);
    }

    #[test]
    fn test_git_directory_is_ignored_by_default() {
        let temp = create_test_tree();
        fs::create_dir(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();

        let outcome = DigestScanner::new()
            .scan(temp.path(), &DigestConfig::default())
            .unwrap();

        assert!(!paths(&outcome).iter().any(|p| p.starts_with(".git/")));
        assert_eq!(outcome.statistics.directories_pruned, 1);
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/repo");
        assert_eq!(relative_path(root, Path::new("/repo")), "");
        assert_eq!(relative_path(root, Path::new("/repo/a/b.rs")), "a/b.rs");
        assert_eq!(join_relative("", "a"), "a");
        assert_eq!(join_relative("a", "b"), "a/b");
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp = TempDir::new().unwrap();
        let err = DigestScanner::new()
            .scan(&temp.path().join("missing"), &DigestConfig::default())
            .unwrap_err();
        assert!(matches!(err, DigestError::NotFound { .. }));
    }

    #[test]
    fn test_file_root_is_error() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = DigestScanner::new()
            .scan(&file, &DigestConfig::default())
            .unwrap_err();
        assert!(matches!(err, DigestError::NotADirectory { .. }));
    }

    #[test]
    fn test_list_directory_is_cached() {
        let temp = create_test_tree();
        fs::write(temp.path().join(".gitignore"), "*.md\n").unwrap();
        let scanner = DigestScanner::new();
        let config = DigestConfig::default();

        let listing = scanner
            .list_directory(temp.path(), &temp.path().join("src"), &config)
            .unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["lib.rs", "nested"]);
        assert!(listing.entries[1].is_dir());

        let root_listing = scanner.list_directory(temp.path(), temp.path(), &config).unwrap();
        let names: Vec<_> = root_listing.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec![".gitignore", "docs", "src"]);
        assert_eq!(scanner.cache().len(), 2);
    }

    #[test]
    fn test_list_directory_respects_each_config() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.md"), "a").unwrap();
        fs::write(temp.path().join("b.rs"), "b").unwrap();
        let scanner = DigestScanner::new();

        let no_markdown = DigestConfig::builder()
            .ignore_patterns(vec!["*.md".to_string()])
            .build()
            .unwrap();
        let first = scanner.list_directory(temp.path(), temp.path(), &no_markdown).unwrap();
        let names: Vec<_> = first.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["b.rs"]);

        let second = scanner
            .list_directory(temp.path(), temp.path(), &DigestConfig::default())
            .unwrap();
        let names: Vec<_> = second.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a.md", "b.rs"]);

        let again = scanner.list_directory(temp.path(), temp.path(), &no_markdown).unwrap();
        assert!(Arc::ptr_eq(&first.entries, &again.entries));
        assert_eq!(scanner.cache().len(), 2);
    }
}
