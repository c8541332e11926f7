use std::fs;
use std::path::Path;

use codedigest_core::{Operation, ProgressMode};
use codedigest_scan::{DigestConfig, DigestScanner, ScanOutcome, WarningKind};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn selected(outcome: &ScanOutcome) -> Vec<&str> {
    outcome
        .files
        .iter()
        .map(|f| f.relative_path.as_str())
        .filter(|p| !p.ends_with(".gitignore"))
        .collect()
}

fn assert_skips_balance(outcome: &ScanOutcome) {
    let stats = &outcome.statistics;
    assert_eq!(stats.files_examined, stats.files_emitted + stats.total_skipped());
}

#[test]
fn test_negated_file_under_excluded_directory_is_selected() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".gitignore", "build/\n!build/keep.txt\n");
    write(root, "build/keep.txt", "keep");
    write(root, "build/other.txt", "other");
    write(root, "src/a.rs", "fn a() {}");

    let outcome = DigestScanner::new().scan(root, &DigestConfig::default()).unwrap();

    assert_eq!(selected(&outcome), vec!["build/keep.txt", "src/a.rs"]);
    assert_eq!(outcome.statistics.skipped_by_ignore, 1);
    assert_skips_balance(&outcome);
}

#[test]
fn test_unanchored_negation_cannot_resurrect_pruned_directory() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".gitignore", "build/\n!keep.txt\n");
    write(root, "build/keep.txt", "keep");
    write(root, "keep.txt", "top-level keep");

    let outcome = DigestScanner::new().scan(root, &DigestConfig::default()).unwrap();

    assert_eq!(selected(&outcome), vec!["keep.txt"]);
    assert_eq!(outcome.statistics.directories_pruned, 1);
}

#[test]
fn test_nested_rule_wins_over_ancestor() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".gitignore", "*.log\n!notes.txt\n");
    write(root, "top.log", "x");
    write(root, "sub/.gitignore", "!keep.log\nnotes.txt\n");
    write(root, "sub/keep.log", "x");
    write(root, "sub/drop.log", "x");
    write(root, "sub/notes.txt", "x");
    write(root, "notes.txt", "x");

    let outcome = DigestScanner::new().scan(root, &DigestConfig::default()).unwrap();

    assert_eq!(selected(&outcome), vec!["notes.txt", "sub/keep.log"]);
    assert_eq!(outcome.statistics.skipped_by_ignore, 3);
    assert_skips_balance(&outcome);
}

#[test]
fn test_oversized_file_is_skipped() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "ten.txt", "0123456789");

    let config = DigestConfig::builder().max_file_size(5u64).build().unwrap();
    let outcome = DigestScanner::new().scan(temp.path(), &config).unwrap();

    assert!(outcome.files.is_empty());
    assert_eq!(outcome.statistics.skipped_by_size, 1);
    assert_eq!(outcome.statistics.bytes_examined, 10);
    assert!(
        outcome
            .statistics
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::LimitExceeded)
    );
}

#[test]
fn test_max_files_counts_the_excess() {
    let temp = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
        write(temp.path(), name, "x");
    }

    let config = DigestConfig::builder().max_files(2usize).build().unwrap();
    let outcome = DigestScanner::new().scan(temp.path(), &config).unwrap();

    assert_eq!(selected(&outcome), vec!["a.txt", "b.txt"]);
    assert_eq!(outcome.statistics.skipped_by_max_files, 2);
    let limit_warnings = outcome
        .statistics
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::LimitExceeded)
        .count();
    assert_eq!(limit_warnings, 1);
    assert_skips_balance(&outcome);
}

#[test]
fn test_total_size_skips_files_that_do_not_fit() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.txt", "aaaa");
    write(temp.path(), "b.txt", "bbbbbbbb");
    write(temp.path(), "c.txt", "cc");

    let config = DigestConfig::builder()
        .max_total_size_bytes(7u64)
        .build()
        .unwrap();
    let outcome = DigestScanner::new().scan(temp.path(), &config).unwrap();

    assert_eq!(selected(&outcome), vec!["a.txt", "c.txt"]);
    assert_eq!(outcome.statistics.skipped_by_total_limit, 1);
    assert!(outcome.statistics.bytes_emitted <= 7);
}

#[test]
fn test_depth_limit() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "a.txt", "x");
    write(root, "d1/b.txt", "x");
    write(root, "d1/d2/c.txt", "x");

    let config = DigestConfig::builder()
        .max_directory_depth(0usize)
        .build()
        .unwrap();
    let outcome = DigestScanner::new().scan(root, &config).unwrap();
    let stats = &outcome.statistics;

    assert_eq!(selected(&outcome), vec!["a.txt"]);
    assert_eq!(stats.skipped_by_depth, 1);
    assert_eq!(stats.directories_pruned, 1);
    // d1/d2 is never read, so c.txt shows up only through the directory count
    assert_eq!(stats.directories_too_deep, 1);
    assert!(stats.limits_hit());
    assert!(stats.warnings.iter().any(|w| w.kind == WarningKind::DirectoryPruned));
    assert_skips_balance(&outcome);
}

#[test]
fn test_filters_apply_after_ignore_rules() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".gitignore", "generated.rs\n");
    write(root, "src/lib.rs", "x");
    write(root, "src/generated.rs", "x");
    write(root, "docs/guide.md", "x");

    let config = DigestConfig::builder()
        .include_patterns(vec!["*.rs".to_string()])
        .build()
        .unwrap();
    let outcome = DigestScanner::new().scan(root, &config).unwrap();

    assert_eq!(selected(&outcome), vec!["src/lib.rs"]);
    assert_eq!(outcome.statistics.skipped_by_ignore, 1);
    // .gitignore and docs/guide.md
    assert_eq!(outcome.statistics.skipped_by_filter, 2);
    assert_skips_balance(&outcome);
}

#[test]
fn test_gitignore_can_be_disabled() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), ".gitignore", "*.txt\n");
    write(temp.path(), "a.txt", "x");

    let config = DigestConfig::builder()
        .respect_gitignore(false)
        .build()
        .unwrap();
    let outcome = DigestScanner::new().scan(temp.path(), &config).unwrap();

    assert_eq!(selected(&outcome), vec!["a.txt"]);
}

#[test]
fn test_digestignore_is_read_after_gitignore() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), ".gitignore", "*.txt\n");
    write(temp.path(), ".digestignore", "!wanted.txt\n");
    write(temp.path(), "wanted.txt", "x");
    write(temp.path(), "unwanted.txt", "x");

    let outcome = DigestScanner::new()
        .scan(temp.path(), &DigestConfig::default())
        .unwrap();

    assert!(selected(&outcome).contains(&"wanted.txt"));
    assert!(!selected(&outcome).contains(&"unwanted.txt"));
}

#[test]
fn test_bad_ignore_line_is_a_warning() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), ".gitignore", "src/[\n*.tmp\n");
    write(temp.path(), "a.tmp", "x");
    write(temp.path(), "a.rs", "x");

    let outcome = DigestScanner::new()
        .scan(temp.path(), &DigestConfig::default())
        .unwrap();

    assert_eq!(selected(&outcome), vec!["a.rs"]);
    assert!(
        outcome
            .statistics
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::IgnoreFile)
    );
}

#[test]
fn test_cancelled_before_scan_is_empty_partial() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.txt", "x");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = DigestScanner::new()
        .scan_with_cancel(temp.path(), &DigestConfig::default(), &cancel)
        .unwrap();

    assert!(outcome.is_partial());
    assert!(outcome.files.is_empty());
    assert!(
        outcome
            .statistics
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::Cancelled)
    );
}

#[test]
fn test_progress_events_bracket_the_scan() {
    let temp = TempDir::new().unwrap();
    for i in 0..5 {
        write(temp.path(), &format!("f{i}.txt"), "x");
    }

    let scanner = DigestScanner::new();
    let mut rx = scanner.subscribe();
    let config = DigestConfig::builder().progress_interval(2usize).build().unwrap();
    scanner.scan(temp.path(), &config).unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(events.iter().all(|e| e.op == Operation::Scan));
    assert_eq!(events.first().map(|e| e.mode), Some(ProgressMode::Start));
    assert_eq!(events.last().map(|e| e.mode), Some(ProgressMode::End));
    assert!(events.iter().any(|e| e.mode == ProgressMode::Progress));
}

#[test]
fn test_unknown_preset_fails_the_scan() {
    let temp = TempDir::new().unwrap();
    let config = DigestConfig::builder()
        .active_presets(vec!["nope".to_string()])
        .build()
        .unwrap();
    assert!(DigestScanner::new().scan(temp.path(), &config).is_err());
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_recorded_not_followed() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "real/file.txt", "x");
    std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

    let outcome = DigestScanner::new().scan(root, &DigestConfig::default()).unwrap();

    assert_eq!(selected(&outcome), vec!["real/file.txt"]);
    assert_eq!(outcome.symlinks.len(), 1);
    assert_eq!(outcome.symlinks[0].relative_path, "link");
    assert_eq!(outcome.statistics.skipped_symlinks, 1);
    assert_skips_balance(&outcome);
}
