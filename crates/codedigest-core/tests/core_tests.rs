use codedigest_core::{
    BinaryPolicy, DigestConfig, DigestStats, FileDescriptor, NodeKind, OutputFormat, SizeBucket,
    SkipReason, TraversalStatistics, TreeMode,
};
use strum::IntoEnumIterator;

#[test]
fn test_config_from_toml_document() {
    let document = r#"
        maxFiles = 200
        maxFileSize = 4096
        binaryPolicy = "includeBase64"
        outputFormat = "json"
        treeMode = "minimal"
        activePresets = ["backend"]

        [tokenDivisorOverrides]
        rs = 3.1

        [[virtualFolders]]
        name = "backend"
        include = ["src/**/*.rs"]
        exclude = ["src/**/tests/**"]
    "#;

    let config: DigestConfig = toml::from_str(document).unwrap();
    config.validate().unwrap();

    assert_eq!(config.max_files, 200);
    assert_eq!(config.max_file_size, 4096);
    assert_eq!(config.binary_policy, BinaryPolicy::IncludeBase64);
    assert_eq!(config.output_format, OutputFormat::Json);
    assert_eq!(config.tree_mode, TreeMode::Minimal);
    assert_eq!(config.divisor_override("rs"), Some(3.1));

    let backend = config.virtual_folder("backend").unwrap();
    assert_eq!(backend.include, vec!["src/**/*.rs".to_string()]);
    assert_eq!(backend.exclude.len(), 1);
}

#[test]
fn test_default_config_is_valid() {
    let config = DigestConfig::default();
    config.validate().unwrap();
    assert!(config.respect_gitignore);
    assert!(config.ignore_patterns.iter().any(|p| p == ".git/"));
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = DigestConfig::builder()
        .max_files(7usize)
        .output_format(OutputFormat::Markdown)
        .build()
        .unwrap();

    let rendered = toml::to_string(&config).unwrap();
    let parsed: DigestConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_skip_buckets_sum() {
    let mut stats = TraversalStatistics::new();
    for (i, reason) in SkipReason::iter().enumerate() {
        for _ in 0..=i {
            stats.record_candidate(1);
            stats.record_skip(reason);
        }
    }
    stats.record_candidate(10);
    stats.record_emitted(10);

    assert_eq!(stats.files_examined, stats.files_emitted + stats.total_skipped());
}

#[test]
fn test_stats_ignore_directories_and_symlinks() {
    let files = vec![
        FileDescriptor::file("/r/a.py", "a.py", 2048, 0),
        FileDescriptor::symlink("/r/link", "link", 0),
        FileDescriptor::directory("/r/pkg", "pkg", 0),
    ];
    let stats = DigestStats::from_descriptors(&files);
    assert_eq!(stats.file_count, 1);
    assert_eq!(stats.size_buckets[&SizeBucket::Small], 1);
    assert_eq!(files[1].kind, NodeKind::Symlink);
}
