//! Ordered ignore-rule stack.
//!
//! Rules from the configuration form the bottom frame; every directory that
//! carries ignore files pushes one frame on top of its parent's stack. A path
//! is evaluated against the whole stack with last-match-wins, so rules from
//! deeper ignore files override their ancestors.
//!
//! A directory matched by an exclusion rule is pruned unless a later anchored
//! negation names something beneath it. In that case the directory is walked
//! with the exclusion inherited at the excluding rule's position: its files
//! stay excluded unless a later negation matches them directly.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};

use codedigest_core::DigestError;

/// Characters that start a glob construct.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// A single gitignore-syntax rule.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    /// Original pattern text.
    pub pattern: String,
    /// Directory (relative to the root) whose ignore file defined the rule.
    pub base: String,
    /// `!pattern`: re-includes instead of excluding.
    pub negated: bool,
    /// Trailing `/`: matches directories only.
    pub dir_only: bool,
    /// Contains a `/`: matched against the path below `base`, not any name.
    pub anchored: bool,
    /// Literal text before the first glob construct, relative to the root.
    literal_prefix: String,
    matcher: GlobMatcher,
}

impl IgnoreRule {
    /// Parse one line of an ignore file. Blank lines and comments yield `None`.
    pub fn parse(line: &str, base: &str) -> Result<Option<Self>, DigestError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('\\').unwrap_or(trimmed)),
        };

        let (dir_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        if body.is_empty() {
            return Ok(None);
        }

        let anchored = body.contains('/');
        let body = body.trim_start_matches('/');
        let base = base.trim_matches('/');

        let glob = match (anchored, base.is_empty()) {
            (true, true) => body.to_string(),
            (true, false) => format!("{base}/{body}"),
            (false, true) => format!("**/{body}"),
            (false, false) => format!("{base}/**/{body}"),
        };

        let matcher = GlobBuilder::new(&glob)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| DigestError::pattern(trimmed, e))?
            .compile_matcher();

        let literal_prefix = match glob.find(GLOB_META) {
            Some(idx) => glob[..idx].to_string(),
            None => glob.clone(),
        };

        Ok(Some(Self {
            pattern: trimmed.to_string(),
            base: base.to_string(),
            negated,
            dir_only,
            anchored,
            literal_prefix,
            matcher,
        }))
    }

    /// Whether the rule matches a root-relative path.
    pub fn matches(&self, relative_path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        self.matcher.is_match(relative_path)
    }

    /// Whether this rule could match a path strictly below `dir`.
    fn reaches_below(&self, dir: &str) -> bool {
        let dir_prefix = format!("{dir}/");
        self.literal_prefix.starts_with(&dir_prefix) || dir_prefix.starts_with(&self.literal_prefix)
    }
}

/// Outcome of evaluating a path against the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDecision {
    /// No rule excludes the path.
    Included,
    /// Excluded; the index is the winning rule's position in the stack.
    Excluded(usize),
}

impl RuleDecision {
    pub fn is_excluded(self) -> bool {
        matches!(self, Self::Excluded(_))
    }
}

/// What to do with a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryAction {
    /// Walk normally.
    Descend,
    /// Walk, but every entry inherits the exclusion at this rule index.
    DescendExcluded(usize),
    /// Do not walk; nothing below can be re-included.
    Prune,
}

/// Immutable, cheaply clonable stack of ignore rules.
#[derive(Debug, Clone, Default)]
pub struct RuleStack {
    rules: Arc<Vec<Arc<IgnoreRule>>>,
}

impl RuleStack {
    /// Empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the bottom frame from root-level patterns.
    pub fn from_patterns(patterns: &[String]) -> Result<Self, DigestError> {
        let mut frame = Vec::new();
        for pattern in patterns {
            if let Some(rule) = IgnoreRule::parse(pattern, "")? {
                frame.push(rule);
            }
        }
        Ok(Self::new().push_frame(frame))
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the stack has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule at a stack position.
    pub fn rule(&self, index: usize) -> Option<&IgnoreRule> {
        self.rules.get(index).map(|r| r.as_ref())
    }

    /// Return a new stack with `frame` on top. Existing indices are preserved.
    pub fn push_frame(&self, frame: Vec<IgnoreRule>) -> Self {
        if frame.is_empty() {
            return self.clone();
        }
        let mut rules = Vec::with_capacity(self.rules.len() + frame.len());
        rules.extend(self.rules.iter().cloned());
        rules.extend(frame.into_iter().map(Arc::new));
        Self {
            rules: Arc::new(rules),
        }
    }

    /// Load the ignore files of `dir` (if any) and push them as one frame.
    ///
    /// Lines that fail to compile are skipped and reported in the returned
    /// messages; unreadable files are reported the same way.
    pub fn with_ignore_files(
        &self,
        dir: &Path,
        relative_dir: &str,
        file_names: &[String],
    ) -> (Self, Vec<(std::path::PathBuf, String)>) {
        let mut frame = Vec::new();
        let mut problems = Vec::new();

        for name in file_names {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(err) => {
                    problems.push((path, format!("Unable to read ignore file: {err}")));
                    continue;
                }
            };
            for line in contents.lines() {
                match IgnoreRule::parse(line, relative_dir) {
                    Ok(Some(rule)) => frame.push(rule),
                    Ok(None) => {}
                    Err(err) => problems.push((path.clone(), err.to_string())),
                }
            }
        }

        (self.push_frame(frame), problems)
    }

    /// Evaluate a path with last-match-wins.
    ///
    /// `inherited` is the exclusion an ancestor directory carries; it counts
    /// as a match at its own stack position, so only later rules can override it.
    pub fn evaluate(&self, relative_path: &str, is_dir: bool, inherited: Option<usize>) -> RuleDecision {
        for (idx, rule) in self.rules.iter().enumerate().rev() {
            if inherited.is_some_and(|i| idx <= i) {
                break;
            }
            if rule.matches(relative_path, is_dir) {
                return if rule.negated {
                    RuleDecision::Included
                } else {
                    RuleDecision::Excluded(idx)
                };
            }
        }
        match inherited {
            Some(idx) => RuleDecision::Excluded(idx),
            None => RuleDecision::Included,
        }
    }

    /// Decide how to treat a directory.
    pub fn directory_action(&self, relative_dir: &str, inherited: Option<usize>) -> DirectoryAction {
        match self.evaluate(relative_dir, true, inherited) {
            RuleDecision::Included => DirectoryAction::Descend,
            RuleDecision::Excluded(idx) => {
                let reachable = self.rules[idx + 1..]
                    .iter()
                    .any(|r| r.negated && r.anchored && r.reaches_below(relative_dir));
                if reachable {
                    DirectoryAction::DescendExcluded(idx)
                } else {
                    DirectoryAction::Prune
                }
            }
        }
    }
}
