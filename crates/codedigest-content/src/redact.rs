//! Secret redaction.
//!
//! Three detectors fire independently and their spans are combined:
//!
//! 1. caller-supplied regular expressions
//! 2. built-in credential shapes (cloud keys, VCS tokens, JWTs, PEM blocks)
//! 3. an entropy heuristic for high-entropy values following a keyword
//!
//! Overlapping spans are merged and each merged span is replaced with the
//! placeholder. Text already inside a placeholder is never matched again, so
//! redacting redacted text is a no-op.

use std::ops::Range;

use regex::{Regex, RegexBuilder, RegexSet};
use serde_json::Value;
use tracing::warn;

use codedigest_core::{DigestConfig, DigestWarning, WarningKind};

/// A built-in credential shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretPatternDef {
    pub id: &'static str,
    /// Pattern text. A `secret` capture group narrows the redacted span.
    pub regex: &'static str,
    pub description: &'static str,
}

/// Credential shapes detected when built-in patterns are enabled.
pub static BUILTIN_PATTERNS: &[SecretPatternDef] = &[
    SecretPatternDef {
        id: "aws_access_key",
        regex: r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b",
        description: "AWS access key IDs",
    },
    SecretPatternDef {
        id: "github_token",
        regex: r"\b(?:ghp|gho|ghu|ghs|ghr)_[A-Za-z0-9]{36,}\b",
        description: "GitHub personal and OAuth tokens",
    },
    SecretPatternDef {
        id: "github_fine_grained_token",
        regex: r"\bgithub_pat_[A-Za-z0-9_]{22,}\b",
        description: "GitHub fine-grained tokens",
    },
    SecretPatternDef {
        id: "slack_token",
        regex: r"\bxox[abposr]-[A-Za-z0-9-]{10,}",
        description: "Slack tokens",
    },
    SecretPatternDef {
        id: "sk_api_key",
        regex: r"\bsk-(?:ant-|proj-|org-|or-)?[A-Za-z0-9_-]{20,}",
        description: "OpenAI and Anthropic style secret keys",
    },
    SecretPatternDef {
        id: "google_api_key",
        regex: r"\bAIza[0-9A-Za-z_-]{35}",
        description: "Google API keys",
    },
    SecretPatternDef {
        id: "jwt",
        regex: r"\beyJ[A-Za-z0-9_-]{8,}\.eyJ[A-Za-z0-9_-]{8,}\.[A-Za-z0-9_-]{8,}",
        description: "JSON Web Tokens",
    },
    SecretPatternDef {
        id: "bearer_token",
        regex: r"(?i)\bbearer\s+(?P<secret>[A-Za-z0-9._~+/-]{16,}=*)",
        description: "Bearer authorization values",
    },
    SecretPatternDef {
        id: "private_key",
        regex: r"(?s)-----BEGIN (?:[A-Z]+ )*PRIVATE KEY-----.*?(?:-----END (?:[A-Z]+ )*PRIVATE KEY-----|\z)",
        description: "PEM private key blocks",
    },
];

/// A candidate value for the entropy heuristic: an alphanumeric run, or an
/// unbroken base64 run with optional `=` padding.
const TOKEN_PATTERN: &str = r"[A-Za-z0-9+/]+={0,2}";

/// Result of redacting one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionOutcome {
    /// Redacted text.
    pub text: String,
    /// At least one substitution happened.
    pub applied: bool,
    /// Number of substituted spans.
    pub matches: usize,
}

/// Result of redacting a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRedaction {
    pub value: Value,
    pub applied: bool,
}

#[derive(Debug, Clone)]
struct EntropyRule {
    keywords: Regex,
    token: Regex,
    threshold: f64,
    min_length: usize,
    window: usize,
}

/// Redaction filter built once per run.
#[derive(Debug, Clone)]
pub struct Redactor {
    placeholder: String,
    caller: Vec<Regex>,
    builtin_set: Option<RegexSet>,
    builtin: Vec<Regex>,
    entropy: Option<EntropyRule>,
    warnings: Vec<DigestWarning>,
}

impl Redactor {
    /// Build a redactor from configuration.
    ///
    /// Caller patterns that fail to compile degrade to a literal match and
    /// produce a warning; building never fails.
    pub fn from_config(config: &DigestConfig) -> Self {
        let mut warnings = Vec::new();

        let caller = config
            .redaction_patterns
            .iter()
            .filter(|p| !p.is_empty())
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    warn!(%pattern, error = %err, "Invalid redaction pattern, matching literally");
                    warnings.push(DigestWarning::new(
                        "",
                        format!("Redaction pattern '{pattern}' is not a valid regex ({err}); matching it literally"),
                        WarningKind::Redaction,
                    ));
                    Regex::new(&regex::escape(pattern)).ok()
                }
            })
            .collect();

        let (builtin_set, builtin) = if config.redact_builtin_patterns {
            let regexes: Vec<Regex> = BUILTIN_PATTERNS
                .iter()
                .filter_map(|def| Regex::new(def.regex).ok())
                .collect();
            let set = RegexSet::new(regexes.iter().map(Regex::as_str)).ok();
            (set, regexes)
        } else {
            (None, Vec::new())
        };

        let entropy = build_entropy_rule(config);

        Self {
            placeholder: config.redaction_placeholder.clone(),
            caller,
            builtin_set,
            builtin,
            entropy,
            warnings,
        }
    }

    /// The replacement text.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Warnings produced while compiling caller patterns.
    pub fn warnings(&self) -> &[DigestWarning] {
        &self.warnings
    }

    /// Redact a string.
    pub fn redact(&self, text: &str) -> RedactionOutcome {
        let protected = self.placeholder_ranges(text);
        let mut spans = Vec::new();

        for regex in &self.caller {
            spans.extend(regex.find_iter(text).map(|m| m.range()));
        }

        if let Some(set) = &self.builtin_set {
            for idx in set.matches(text).iter() {
                let regex = &self.builtin[idx];
                for caps in regex.captures_iter(text) {
                    let m = caps.name("secret").or_else(|| caps.get(0));
                    if let Some(m) = m {
                        spans.push(m.range());
                    }
                }
            }
        }

        if let Some(rule) = &self.entropy {
            spans.extend(rule.find(text, &protected));
        }

        let spans = subtract(merge(spans), &protected);
        if spans.is_empty() {
            return RedactionOutcome {
                text: text.to_string(),
                applied: false,
                matches: 0,
            };
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for span in &spans {
            out.push_str(&text[cursor..span.start]);
            out.push_str(&self.placeholder);
            cursor = span.end;
        }
        out.push_str(&text[cursor..]);

        RedactionOutcome {
            text: out,
            applied: true,
            matches: spans.len(),
        }
    }

    /// Redact a JSON value. Only strings are inspected.
    pub fn redact_value(&self, value: Value) -> ValueRedaction {
        match value {
            Value::String(s) => {
                let outcome = self.redact(&s);
                ValueRedaction {
                    value: Value::String(outcome.text),
                    applied: outcome.applied,
                }
            }
            other => ValueRedaction {
                value: other,
                applied: false,
            },
        }
    }

    fn placeholder_ranges(&self, text: &str) -> Vec<Range<usize>> {
        if self.placeholder.is_empty() {
            return Vec::new();
        }
        text.match_indices(&self.placeholder)
            .map(|(start, p)| start..start + p.len())
            .collect()
    }
}

fn build_entropy_rule(config: &DigestConfig) -> Option<EntropyRule> {
    let keywords: Vec<String> = config
        .entropy_keywords
        .iter()
        .filter(|k| !k.is_empty())
        .map(|k| regex::escape(k))
        .collect();
    if keywords.is_empty() || config.entropy_window == 0 {
        return None;
    }

    let keywords = RegexBuilder::new(&keywords.join("|"))
        .case_insensitive(true)
        .build()
        .ok()?;
    let token = Regex::new(TOKEN_PATTERN).ok()?;

    Some(EntropyRule {
        keywords,
        token,
        threshold: config.entropy_threshold,
        min_length: config.entropy_min_length.max(1),
        window: config.entropy_window,
    })
}

impl EntropyRule {
    /// For each keyword, the first qualifying token starting within the
    /// window. Scanning for a keyword stops at the first placeholder, which
    /// marks a value that was already redacted.
    fn find(&self, text: &str, protected: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut spans = Vec::new();

        for keyword in self.keywords.find_iter(text) {
            if inside(keyword.start(), protected) || !stands_alone(text, keyword.range()) {
                continue;
            }
            let start = keyword.end();
            let window_end = text[start..]
                .char_indices()
                .nth(self.window)
                .map(|(i, _)| start + i)
                .unwrap_or(text.len());
            let stop = protected
                .iter()
                .find(|r| r.start >= start)
                .map(|r| r.start)
                .unwrap_or(text.len());

            'tokens: for token in self.token.find_iter(&text[start..]) {
                let range = start + token.start()..start + token.end();
                if range.start >= window_end || range.start >= stop {
                    break;
                }
                for candidate in candidates(token.as_str(), range.start) {
                    let value = &text[candidate.clone()];
                    if value.len() >= self.min_length
                        && looks_like_secret(value)
                        && shannon_entropy(value) >= self.threshold
                    {
                        spans.push(candidate);
                        break 'tokens;
                    }
                }
            }
        }

        spans
    }
}

/// A keyword counts only as a word of its own: `api_key`, `apiKey` and
/// `SECRET_TOKEN` arm the heuristic, `Keyboard` and `tokenizer` do not.
fn stands_alone(text: &str, keyword: Range<usize>) -> bool {
    let matched = &text[keyword.clone()];
    let first_upper = matched.starts_with(|c: char| c.is_ascii_uppercase());
    let last_upper = matched.ends_with(|c: char| c.is_ascii_uppercase());

    let before = text[..keyword.start].chars().next_back();
    let after = text[keyword.end..].chars().next();

    let open = match before {
        Some(c) if c.is_ascii_digit() => false,
        Some(c) if c.is_ascii_alphabetic() => c.is_ascii_lowercase() && first_upper,
        _ => true,
    };
    let closed = match after {
        Some(c) if c.is_ascii_digit() => false,
        Some(c) if c.is_ascii_alphabetic() => c.is_ascii_uppercase() && !last_upper,
        _ => true,
    };
    open && closed
}

/// Values to test inside one token. A token with `/` but no base64 marker
/// (`+` or `=` padding) is a path, so each segment is tested on its own.
fn candidates(token: &str, offset: usize) -> Vec<Range<usize>> {
    let is_base64 = token.contains('+') || token.ends_with('=');
    if !token.contains('/') || is_base64 {
        return vec![offset..offset + token.len()];
    }
    let mut out = Vec::new();
    let mut start = 0;
    for segment in token.split('/') {
        if !segment.is_empty() {
            out.push(offset + start..offset + start + segment.len());
        }
        start += segment.len() + 1;
    }
    out
}

/// Secrets mix letters and digits; identifiers usually do not.
fn looks_like_secret(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit()) && value.chars().any(|c| c.is_ascii_alphabetic())
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(value: &str) -> f64 {
    let mut counts = std::collections::HashMap::new();
    let mut total = 0usize;
    for c in value.chars() {
        *counts.entry(c).or_insert(0usize) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

fn inside(position: usize, ranges: &[Range<usize>]) -> bool {
    ranges.iter().any(|r| r.contains(&position))
}

/// Sort and merge overlapping or touching spans. Empty spans are dropped.
fn merge(mut spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    spans.retain(|s| s.start < s.end);
    spans.sort_by_key(|s| (s.start, s.end));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// Remove the parts of `spans` covered by `protected`. Both are sorted.
fn subtract(spans: Vec<Range<usize>>, protected: &[Range<usize>]) -> Vec<Range<usize>> {
    if protected.is_empty() {
        return spans;
    }
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        let mut start = span.start;
        for p in protected.iter().filter(|p| p.start < span.end && p.end > span.start) {
            if p.start > start {
                out.push(start..p.start);
            }
            start = start.max(p.end);
        }
        if start < span.end {
            out.push(start..span.end);
        }
    }
    out
}
