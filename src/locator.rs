//! Symbol locator: first matching declaration wins.
//!
//! Traversal is strict pre-order and stops at the first node matching any of
//! the three declaration shapes — not the most specific or outermost match.
//! Variable declarators are promoted to their enclosing statement so the
//! extracted span carries its `const`/`let`/`var` keyword.

use tree_sitter::Node;

use crate::error::{QueryError, QueryResult};
use crate::parse::{
    declarator_name, declared_name, is_function_declaration, parse_module, ParseOptions,
};
use crate::printer::pretty_print;

/// Byte span of a located declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolSpan {
    pub start_byte: usize,
    pub end_byte: usize,
    /// 1-based line of the span start.
    pub start_line: u32,
    pub end_line: u32,
}

impl SymbolSpan {
    fn of(node: Node) -> Self {
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row as u32 + 1,
            end_line: node.end_position().row as u32 + 1,
        }
    }
}

/// Parse `source` and extract the pretty-printed text of the first
/// declaration of `name`.
pub fn extract_symbol(source: &str, name: &str, opts: &ParseOptions) -> QueryResult<String> {
    let tree = parse_module(source, opts)?;
    let span = locate(tree.root_node(), source, name)
        .ok_or_else(|| QueryError::SymbolNotFound(name.to_string()))?;
    pretty_print(&source[span.start_byte..span.end_byte])
}

/// Locate the span of the first declaration of `name` in pre-order.
pub fn locate(root: Node, source: &str, name: &str) -> Option<SymbolSpan> {
    if let Some(span) = match_declaration(root, source, name) {
        return Some(span);
    }
    let mut cursor = root.walk();
    let children: Vec<Node> = root.named_children(&mut cursor).collect();
    for child in children {
        if let Some(span) = locate(child, source, name) {
            return Some(span);
        }
    }
    None
}

fn match_declaration(node: Node, source: &str, name: &str) -> Option<SymbolSpan> {
    let kind = node.kind();

    if is_function_declaration(kind) || kind == "class_declaration" {
        if declared_name(source, node) == Some(name) {
            return Some(SymbolSpan::of(node));
        }
        return None;
    }

    if kind == "variable_declarator" && declarator_name(source, node) == Some(name) {
        return Some(promote_declarator(node, source));
    }

    None
}

/// Promote a matched declarator to its enclosing declaration statement so
/// the span starts at the declaration keyword. Multi-declarator statements
/// (`const a = 1, b = 2;`) keep the declarator-only span.
fn promote_declarator(declarator: Node, source: &str) -> SymbolSpan {
    let Some(parent) = declarator.parent() else {
        return SymbolSpan::of(declarator);
    };
    if !matches!(parent.kind(), "lexical_declaration" | "variable_declaration") {
        return SymbolSpan::of(declarator);
    }

    let mut cursor = parent.walk();
    let declarators = parent
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "variable_declarator")
        .count();
    if declarators == 1 {
        SymbolSpan::of(parent)
    } else {
        SymbolSpan::of(declarator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_module;

    fn find(source: &str, name: &str) -> Option<String> {
        let tree = parse_module(source, &ParseOptions::default()).unwrap();
        locate(tree.root_node(), source, name)
            .map(|s| source[s.start_byte..s.end_byte].to_string())
    }

    #[test]
    fn finds_function_declarations() {
        let src = "const x = 1;\nfunction hit(a) { return a; }\n";
        assert_eq!(find(src, "hit").unwrap(), "function hit(a) { return a; }");
    }

    #[test]
    fn finds_class_declarations() {
        let src = "class Other {}\nclass Wanted { m() {} }";
        assert_eq!(find(src, "Wanted").unwrap(), "class Wanted { m() {} }");
    }

    #[test]
    fn declarator_span_includes_the_keyword() {
        let src = "const handler = (req) => req.end();";
        assert_eq!(find(src, "handler").unwrap(), src);
    }

    #[test]
    fn declarator_matches_any_initializer() {
        // The locator is broader than the inventory: non-function values match too.
        let src = "const config = { retries: 3 };";
        assert_eq!(find(src, "config").unwrap(), src);
    }

    #[test]
    fn multi_declarator_statement_keeps_the_narrow_span() {
        let src = "const a = 1, target = 2;";
        assert_eq!(find(src, "target").unwrap(), "target = 2");
    }

    #[test]
    fn first_match_wins_in_preorder() {
        let src = "function dup() { return 1; }\nconst dup = () => 2;";
        assert_eq!(find(src, "dup").unwrap(), "function dup() { return 1; }");
    }

    #[test]
    fn destructured_bindings_never_match() {
        let src = "const { dest } = require('./m');\nfunction other() {}";
        assert!(find(src, "dest").is_none());
    }

    #[test]
    fn extract_symbol_pretty_prints_and_errors() {
        let src = "if (x) {\n    function deep() {\n        return 1;\n    }\n}";
        let out = extract_symbol(src, "deep", &ParseOptions::default()).unwrap();
        assert!(out.starts_with("function deep()"));
        assert!(!out.contains("\n    function"), "span must be dedented");

        assert!(matches!(
            extract_symbol(src, "missing", &ParseOptions::default()),
            Err(QueryError::SymbolNotFound(_))
        ));
    }
}
