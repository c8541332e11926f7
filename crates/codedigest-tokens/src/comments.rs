//! Language-agnostic detection of comment-like lines.

/// Whole-line comment markers.
const LINE_MARKERS: &[&str] = &["//", "#", "--", ";;", "%"];

/// `#`-led lines that are code: attributes, shebangs and preprocessor
/// directives.
const HASH_CODE_PREFIXES: &[&str] = &[
    "#[", "#!", "#include", "#define", "#undef", "#ifdef", "#ifndef", "#if", "#elif", "#else", "#endif", "#pragma",
    "#import", "#error", "#line",
];

/// Extensions where `#` starts a heading, not a comment.
const MARKUP_EXTENSIONS: &[&str] = &["md", "markdown", "mdx", "rst", "adoc"];

/// Block comment delimiters (open, close).
const BLOCK_MARKERS: &[(&str, &str)] = &[("/*", "*/"), ("<!--", "-->"), ("\"\"\"", "\"\"\"")];

/// Character counts split by comment-ness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharSplit {
    pub plain: usize,
    pub comment: usize,
}

impl CharSplit {
    pub fn total(&self) -> usize {
        self.plain + self.comment
    }
}

/// Count characters (Unicode scalar values) on plain and comment lines.
///
/// A line is a comment when its trimmed start is a line-comment marker or
/// it lies within a block comment. Newlines count with their line.
pub fn split_chars(text: &str) -> CharSplit {
    split_chars_for(text, None)
}

/// [`split_chars`] for a file with the given extension. Markup files never
/// treat `#` as a comment marker.
pub fn split_chars_for(text: &str, extension: Option<&str>) -> CharSplit {
    let hash_comments = !extension.is_some_and(|ext| {
        let ext = ext.trim_start_matches('.');
        MARKUP_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext))
    });
    let mut split = CharSplit::default();
    let mut closing: Option<&'static str> = None;

    for line in text.split_inclusive('\n') {
        let chars = line.chars().count();
        let trimmed = line.trim_start();

        if let Some(close) = closing {
            split.comment += chars;
            if line.contains(close) {
                closing = None;
            }
            continue;
        }

        if let Some((open, close)) = BLOCK_MARKERS.iter().find(|(open, _)| trimmed.starts_with(open)) {
            split.comment += chars;
            if !trimmed[open.len()..].contains(close) {
                closing = Some(close);
            }
            continue;
        }

        if is_line_comment(trimmed, hash_comments) {
            split.comment += chars;
        } else {
            split.plain += chars;
        }
    }

    split
}

fn is_line_comment(trimmed: &str, hash_comments: bool) -> bool {
    if trimmed.starts_with('#') {
        return hash_comments && !is_hash_code(trimmed);
    }
    LINE_MARKERS.iter().any(|m| trimmed.starts_with(m))
}

fn is_hash_code(trimmed: &str) -> bool {
    HASH_CODE_PREFIXES.iter().any(|prefix| {
        trimmed.strip_prefix(prefix).is_some_and(|rest| {
            // `#if` must not swallow `#iffy`; `#[` and `#!` stand on their own
            prefix.len() <= 2 || !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_comments() {
        let split = split_chars("// note\nlet x = 1;\n# shell\n");
        assert_eq!(split.comment, "// note\n".len() + "# shell\n".len());
        assert_eq!(split.plain, "let x = 1;\n".len());
    }

    #[test]
    fn test_indented_markers() {
        let split = split_chars("    -- sql comment\n  ;; lisp\n");
        assert_eq!(split.plain, 0);
    }

    #[test]
    fn test_block_comments() {
        let text = "/*\n * doc\n */\nfn a() {}\n<!-- one line -->\n\"\"\"\ndocstring\n\"\"\"\nx\n";
        let split = split_chars(text);
        assert_eq!(split.plain, "fn a() {}\n".len() + "x\n".len());
        assert_eq!(split.total(), text.chars().count());
    }

    #[test]
    fn test_trailing_code_comments_are_plain() {
        let split = split_chars("let x = 1; // trailing\n");
        assert_eq!(split.comment, 0);
    }

    #[test]
    fn test_counts_scalar_values() {
        let split = split_chars("héllo\n");
        assert_eq!(split.plain, 6);
    }

    #[test]
    fn test_hash_code_lines_are_plain() {
        let text = "#[derive(Debug)]\n#![allow(dead_code)]\n#include <stdio.h>\n#define N 4\n#ifdef X\n";
        let split = split_chars(text);
        assert_eq!(split.comment, 0);
        assert_eq!(split.plain, text.chars().count());

        let split = split_chars("#iffy comment\n");
        assert_eq!(split.plain, 0);
    }

    #[test]
    fn test_markup_headings_are_plain() {
        let text = "# Title\n\nbody\n";
        assert_eq!(split_chars(text).comment, "# Title\n".len());
        assert_eq!(split_chars_for(text, Some("md")).comment, 0);
        assert_eq!(split_chars_for(text, Some(".Markdown")).comment, 0);
        assert_eq!(split_chars_for(text, Some("py")).comment, "# Title\n".len());
    }
}
