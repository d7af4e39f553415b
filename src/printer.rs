//! The pretty-print collaborator.
//!
//! Spans extracted from the middle of a unit carry that unit's indentation.
//! Output here is reflowed just enough to read standalone: the common leading
//! indent is stripped and trailing whitespace removed. This is a formatter
//! for extracted snippets, not a JavaScript printer.

use crate::error::{QueryError, QueryResult};

/// Reformat an extracted source span for standalone display.
///
/// Fails on binary-looking input (NUL bytes) — a span sliced out of a
/// miscategorized unit.
pub fn pretty_print(snippet: &str) -> QueryResult<String> {
    if snippet.contains('\0') {
        return Err(QueryError::ParseFailure(
            "input contains NUL bytes".to_string(),
        ));
    }

    let indent = common_indent(snippet);
    let mut out = String::with_capacity(snippet.len());
    for line in snippet.lines() {
        let line = line.strip_prefix(indent.as_str()).unwrap_or(line);
        out.push_str(line.trim_end_matches([' ', '\t', '\r']));
        out.push('\n');
    }
    while out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

/// Longest whitespace prefix shared by every non-blank line.
fn common_indent(text: &str) -> String {
    let mut common: Option<&str> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let ws_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let prefix = &line[..ws_len];
        common = Some(match common {
            None => prefix,
            Some(prev) => shared_prefix(prev, prefix),
        });
        if common == Some("") {
            break;
        }
    }
    common.unwrap_or("").to_string()
}

fn shared_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let n = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..n]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedents_a_nested_span() {
        let snippet = "    function inner() {\n        return 1;\n    }";
        let out = pretty_print(snippet).unwrap();
        assert_eq!(out, "function inner() {\n    return 1;\n}");
    }

    #[test]
    fn top_level_span_is_unchanged() {
        let snippet = "const x = 1;";
        assert_eq!(pretty_print(snippet).unwrap(), "const x = 1;");
    }

    #[test]
    fn blank_lines_do_not_break_dedent() {
        let snippet = "  a();\n\n  b();";
        assert_eq!(pretty_print(snippet).unwrap(), "a();\n\nb();");
    }

    #[test]
    fn trailing_whitespace_is_stripped() {
        let out = pretty_print("f();   \n").unwrap();
        assert_eq!(out, "f();");
    }

    #[test]
    fn nul_bytes_are_rejected() {
        assert!(pretty_print("a\0b").is_err());
    }
}
