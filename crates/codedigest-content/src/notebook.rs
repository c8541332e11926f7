//! Jupyter notebook rendering.
//!
//! Cells are rendered in document order: markdown and raw cells as their
//! source text, code cells as a fenced block in the notebook's language
//! followed by their textual outputs.

use serde_json::Value;

/// Rendering options taken from the digest configuration.
#[derive(Debug, Clone, Copy)]
pub struct NotebookOptions {
    /// Render cell outputs at all.
    pub include_outputs: bool,
    /// Render outputs other than plain text (HTML, images, ...).
    pub include_non_text_outputs: bool,
    /// Truncation length for non-text outputs.
    pub output_max_bytes: usize,
}

impl Default for NotebookOptions {
    fn default() -> Self {
        Self {
            include_outputs: true,
            include_non_text_outputs: false,
            output_max_bytes: 4096,
        }
    }
}

/// Render a notebook document. Returns `None` if it is not a notebook.
pub fn render_notebook(source: &str, options: &NotebookOptions) -> Option<String> {
    let document: Value = serde_json::from_str(source).ok()?;
    let cells = document.get("cells")?.as_array()?;
    let language = notebook_language(&document);

    let mut rendered = Vec::with_capacity(cells.len());
    for cell in cells {
        let cell_type = cell.get("cell_type").and_then(Value::as_str).unwrap_or("raw");
        let body = join_text(cell.get("source"));

        match cell_type {
            "code" => {
                let mut block = fenced(&language, &body);
                if options.include_outputs
                    && let Some(outputs) = cell.get("outputs").and_then(Value::as_array)
                {
                    let text = render_outputs(outputs, options);
                    if !text.is_empty() {
                        block.push_str("\n\nOutput:\n");
                        block.push_str(&fenced("", &text));
                    }
                }
                rendered.push(block);
            }
            _ => {
                if !body.trim().is_empty() {
                    rendered.push(body.trim_end().to_string());
                }
            }
        }
    }

    Some(rendered.join("\n\n"))
}

fn notebook_language(document: &Value) -> String {
    let metadata = document.get("metadata");
    metadata
        .and_then(|m| m.pointer("/language_info/name"))
        .or_else(|| metadata.and_then(|m| m.pointer("/kernelspec/language")))
        .and_then(Value::as_str)
        .unwrap_or("python")
        .to_ascii_lowercase()
}

fn render_outputs(outputs: &[Value], options: &NotebookOptions) -> String {
    let mut parts = Vec::new();

    for output in outputs {
        match output.get("output_type").and_then(Value::as_str) {
            Some("stream") => parts.push(join_text(output.get("text"))),
            Some("execute_result") | Some("display_data") => {
                let Some(data) = output.get("data").and_then(Value::as_object) else {
                    continue;
                };
                if let Some(plain) = data.get("text/plain") {
                    parts.push(join_text(Some(plain)));
                }
                if options.include_non_text_outputs {
                    for (mime, value) in data.iter().filter(|(mime, _)| *mime != "text/plain") {
                        let text = truncate(&join_text(Some(value)), options.output_max_bytes);
                        parts.push(format!("[{mime}]\n{text}"));
                    }
                }
            }
            Some("error") => {
                let name = output.get("ename").and_then(Value::as_str).unwrap_or("Error");
                let value = output.get("evalue").and_then(Value::as_str).unwrap_or_default();
                let traceback = join_lines(output.get("traceback"));
                let mut text = format!("{name}: {value}");
                if !traceback.is_empty() {
                    text.push('\n');
                    text.push_str(&strip_ansi(&traceback));
                }
                parts.push(text);
            }
            _ => {}
        }
    }

    parts
        .iter()
        .map(|p| p.trim_end())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Notebook text fields are either a string or an array of line strings.
fn join_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

/// Like [`join_text`], but array items are separate lines without newlines.
fn join_lines(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        other => join_text(other),
    }
}

/// Remove terminal color sequences (`ESC [ ... letter`).
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}… [truncated {} bytes]", &text[..end], text.len() - end)
}

/// Fence `body` with enough backticks that nothing inside closes it early.
pub fn fenced(info: &str, body: &str) -> String {
    let fence = "`".repeat(fence_len(body));
    let body = body.strip_suffix('\n').unwrap_or(body);
    format!("{fence}{info}\n{body}\n{fence}")
}

/// Shortest fence (at least three) longer than any backtick run in `body`.
pub fn fence_len(body: &str) -> usize {
    let mut longest = 0;
    let mut run = 0;
    for c in body.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    (longest + 1).max(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notebook(cells: Value) -> String {
        json!({
            "cells": cells,
            "metadata": {"kernelspec": {"language": "python"}},
            "nbformat": 4,
            "nbformat_minor": 5
        })
        .to_string()
    }

    #[test]
    fn test_cells_in_document_order() {
        let source = notebook(json!([
            {"cell_type": "markdown", "source": ["# Title\n", "intro"]},
            {"cell_type": "code", "source": "x = 1\nprint(x)", "outputs": [
                {"output_type": "stream", "name": "stdout", "text": ["1\n"]}
            ]},
            {"cell_type": "raw", "source": "raw text"}
        ]));

        let rendered = render_notebook(&source, &NotebookOptions::default()).unwrap();
        let title = rendered.find("# Title").unwrap();
        let code = rendered.find("```python\nx = 1").unwrap();
        let output = rendered.find("Output:\n```\n1\n```").unwrap();
        let raw = rendered.find("raw text").unwrap();
        assert!(title < code && code < output && output < raw);
    }

    #[test]
    fn test_outputs_can_be_disabled() {
        let source = notebook(json!([
            {"cell_type": "code", "source": "1 + 1", "outputs": [
                {"output_type": "execute_result", "data": {"text/plain": "2"}}
            ]}
        ]));
        let options = NotebookOptions {
            include_outputs: false,
            ..Default::default()
        };
        let rendered = render_notebook(&source, &options).unwrap();
        assert!(!rendered.contains("Output:"));
    }

    #[test]
    fn test_non_text_outputs_are_truncated() {
        let source = notebook(json!([
            {"cell_type": "code", "source": "plot()", "outputs": [
                {"output_type": "display_data", "data": {
                    "text/plain": "<Figure>",
                    "image/png": "A".repeat(100)
                }}
            ]}
        ]));

        let hidden = render_notebook(&source, &NotebookOptions::default()).unwrap();
        assert!(hidden.contains("<Figure>"));
        assert!(!hidden.contains("image/png"));

        let options = NotebookOptions {
            include_non_text_outputs: true,
            output_max_bytes: 10,
            ..Default::default()
        };
        let shown = render_notebook(&source, &options).unwrap();
        assert!(shown.contains("[image/png]\nAAAAAAAAAA… [truncated 90 bytes]"));
    }

    #[test]
    fn test_error_output_strips_ansi() {
        let source = notebook(json!([
            {"cell_type": "code", "source": "1/0", "outputs": [
                {"output_type": "error", "ename": "ZeroDivisionError", "evalue": "division by zero",
                 "traceback": ["\u{1b}[0;31mZeroDivisionError\u{1b}[0m", "line 1"]}
            ]}
        ]));
        let rendered = render_notebook(&source, &NotebookOptions::default()).unwrap();
        assert!(rendered.contains("ZeroDivisionError: division by zero"));
        assert!(!rendered.contains('\u{1b}'));
    }

    #[test]
    fn test_malformed_notebook_is_none() {
        assert!(render_notebook("{not json", &NotebookOptions::default()).is_none());
        assert!(render_notebook(r#"{"cells": 3}"#, &NotebookOptions::default()).is_none());
    }

    #[test]
    fn test_fence_outgrows_backticks() {
        assert_eq!(fence_len("plain"), 3);
        assert_eq!(fence_len("has ``` inside"), 4);
        assert!(fenced("md", "````").starts_with("`````md\n"));
    }
}
