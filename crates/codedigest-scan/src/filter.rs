//! Include/exclude globs and virtual-folder presets.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use codedigest_core::{DigestConfig, DigestError};

/// A pair of glob sets: patterns with a `/` match the relative path,
/// bare patterns match the file name at any depth.
#[derive(Debug, Clone)]
struct PatternSet {
    by_path: GlobSet,
    by_name: GlobSet,
    len: usize,
}

impl PatternSet {
    fn compile(patterns: &[String]) -> Result<Self, DigestError> {
        let mut by_path = GlobSetBuilder::new();
        let mut by_name = GlobSetBuilder::new();

        for pattern in patterns {
            let trimmed = pattern.trim().trim_start_matches("./");
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.contains('/') {
                let glob = GlobBuilder::new(trimmed.trim_start_matches('/'))
                    .literal_separator(true)
                    .build()
                    .map_err(|e| DigestError::pattern(pattern.as_str(), e))?;
                by_path.add(glob);
            } else {
                let glob = Glob::new(trimmed).map_err(|e| DigestError::pattern(pattern.as_str(), e))?;
                by_name.add(glob);
            }
        }

        Ok(Self {
            by_path: by_path.build().map_err(|e| DigestError::pattern("<set>", e))?,
            by_name: by_name.build().map_err(|e| DigestError::pattern("<set>", e))?,
            len: patterns.iter().filter(|p| !p.trim().is_empty()).count(),
        })
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_match(&self, relative_path: &str) -> bool {
        let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
        self.by_name.is_match(name) || self.by_path.is_match(relative_path)
    }
}

#[derive(Debug, Clone)]
struct Preset {
    name: String,
    include: PatternSet,
    exclude: PatternSet,
}

impl Preset {
    fn accepts(&self, relative_path: &str) -> bool {
        (self.include.is_empty() || self.include.is_match(relative_path))
            && !self.exclude.is_match(relative_path)
    }
}

/// Selection filter applied after ignore rules.
///
/// A file passes when it matches the include globs (or none are set), matches
/// no exclude glob, and is accepted by every active preset.
#[derive(Debug, Clone)]
pub struct SelectionFilter {
    include: PatternSet,
    exclude: PatternSet,
    presets: Vec<Preset>,
}

impl SelectionFilter {
    /// Compile the filter from configuration.
    ///
    /// Unknown preset names and invalid globs are configuration errors.
    pub fn from_config(config: &DigestConfig) -> Result<Self, DigestError> {
        let mut presets = Vec::with_capacity(config.active_presets.len());
        for name in &config.active_presets {
            let folder = config
                .virtual_folder(name)
                .ok_or_else(|| DigestError::config(format!("Unknown preset '{name}'")))?;
            presets.push(Preset {
                name: folder.name.clone(),
                include: PatternSet::compile(&folder.include)?,
                exclude: PatternSet::compile(&folder.exclude)?,
            });
        }

        Ok(Self {
            include: PatternSet::compile(&config.include_patterns)?,
            exclude: PatternSet::compile(&config.exclude_patterns)?,
            presets,
        })
    }

    /// Whether the filter rejects nothing.
    pub fn is_pass_through(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty() && self.presets.is_empty()
    }

    /// Names of active presets.
    pub fn preset_names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    /// Whether a root-relative file path is selected.
    pub fn accepts(&self, relative_path: &str) -> bool {
        if !self.include.is_empty() && !self.include.is_match(relative_path) {
            return false;
        }
        if self.exclude.is_match(relative_path) {
            return false;
        }
        self.presets.iter().all(|p| p.accepts(relative_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedigest_core::VirtualFolder;

    fn filter(include: &[&str], exclude: &[&str]) -> SelectionFilter {
        let config = DigestConfig::builder()
            .include_patterns(include.iter().map(|s| s.to_string()).collect::<Vec<_>>())
            .exclude_patterns(exclude.iter().map(|s| s.to_string()).collect::<Vec<_>>())
            .build()
            .unwrap();
        SelectionFilter::from_config(&config).unwrap()
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let f = filter(&[], &[]);
        assert!(f.is_pass_through());
        assert!(f.accepts("any/thing.bin"));
    }

    #[test]
    fn test_bare_pattern_matches_name_at_any_depth() {
        let f = filter(&["*.rs"], &[]);
        assert!(f.accepts("main.rs"));
        assert!(f.accepts("src/deep/lib.rs"));
        assert!(!f.accepts("src/readme.md"));
    }

    #[test]
    fn test_path_pattern_respects_separators() {
        let f = filter(&["src/*.rs"], &[]);
        assert!(f.accepts("src/lib.rs"));
        assert!(!f.accepts("src/nested/lib.rs"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let f = filter(&["*.rs"], &["tests/**"]);
        assert!(f.accepts("src/lib.rs"));
        assert!(!f.accepts("tests/it.rs"));
    }

    #[test]
    fn test_presets_intersect() {
        let config = DigestConfig::builder()
            .virtual_folders(vec![
                VirtualFolder::new("backend", vec!["server/**".into()]),
                VirtualFolder::new("rust", vec!["*.rs".into()]),
            ])
            .active_presets(vec!["backend".to_string(), "rust".to_string()])
            .build()
            .unwrap();
        let f = SelectionFilter::from_config(&config).unwrap();

        assert!(f.accepts("server/main.rs"));
        assert!(!f.accepts("server/main.py"));
        assert!(!f.accepts("client/main.rs"));
        assert_eq!(f.preset_names().collect::<Vec<_>>(), vec!["backend", "rust"]);
    }

    #[test]
    fn test_unknown_preset_is_config_error() {
        let config = DigestConfig::builder()
            .active_presets(vec!["missing".to_string()])
            .build()
            .unwrap();
        let err = SelectionFilter::from_config(&config).unwrap_err();
        assert!(matches!(err, DigestError::InvalidConfig { .. }));
    }

    #[test]
    fn test_invalid_glob_is_pattern_error() {
        let config = DigestConfig::builder()
            .include_patterns(vec!["src/[".to_string()])
            .build()
            .unwrap();
        let err = SelectionFilter::from_config(&config).unwrap_err();
        assert!(matches!(err, DigestError::InvalidPattern { .. }));
    }
}
