//! The parse collaborator: tree-sitter with the TypeScript grammar.
//!
//! Bundled JavaScript and TypeScript share the TypeScript grammar; the TSX
//! grammar is used for JSX-bearing sources. tree-sitter always produces a
//! tree, so "malformed input" here means a tree containing error or missing
//! nodes — those surface as `ParseFailure` with the first error position.

use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{QueryError, QueryResult};

/// Dialect flags for one parse call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub jsx: bool,
    pub jsx_recovery: bool,
}

impl ParseOptions {
    pub fn from_config(cfg: &crate::config::ParserConfig) -> Self {
        Self {
            jsx: cfg.jsx,
            jsx_recovery: cfg.jsx_recovery,
        }
    }
}

fn grammar_for(jsx: bool) -> Language {
    if jsx {
        tree_sitter_typescript::language_tsx()
    } else {
        // JS/TS share the TypeScript grammar for our purposes.
        tree_sitter_typescript::language_typescript()
    }
}

fn parse_with(source: &str, language: &Language) -> QueryResult<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| QueryError::ParseFailure(e.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| QueryError::ParseFailure("parser produced no tree".to_string()))
}

/// Parse one source document.
///
/// With `jsx_recovery` set and the plain grammar producing an error tree,
/// the parse is retried once with the TSX grammar — bundles occasionally
/// ship un-transpiled JSX fragments that only the TSX grammar accepts.
pub fn parse_module(source: &str, opts: &ParseOptions) -> QueryResult<Tree> {
    let tree = parse_with(source, &grammar_for(opts.jsx))?;
    if !tree.root_node().has_error() {
        return Ok(tree);
    }

    if opts.jsx_recovery && !opts.jsx {
        let retry = parse_with(source, &grammar_for(true))?;
        if !retry.root_node().has_error() {
            return Ok(retry);
        }
    }

    Err(QueryError::ParseFailure(describe_first_error(
        tree.root_node(),
    )))
}

fn describe_first_error(root: Node) -> String {
    if let Some(node) = first_error_node(root) {
        let pos = node.start_position();
        format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1)
    } else {
        "syntax error".to_string()
    }
}

fn first_error_node(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        if let Some(found) = first_error_node(child) {
            return Some(found);
        }
    }
    None
}

/// Source text of a node.
pub fn node_text<'a>(source: &'a str, node: Node) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// Named function declaration kinds (declaration statements, not expressions).
pub fn is_function_declaration(kind: &str) -> bool {
    matches!(kind, "function_declaration" | "generator_function_declaration")
}

/// Expression kinds that produce a function value when used as a variable
/// initializer. Grammar versions differ on `function` vs `function_expression`.
pub fn is_function_value(kind: &str) -> bool {
    matches!(
        kind,
        "arrow_function"
            | "function"
            | "function_expression"
            | "generator_function"
            | "generator_function_expression"
    )
}

/// The declared identifier of a function/class declaration, if present.
pub fn declared_name<'a>(source: &'a str, node: Node) -> Option<&'a str> {
    let name = node.child_by_field_name("name")?;
    Some(node_text(source, name))
}

/// The bound identifier of a variable declarator.
///
/// Destructuring patterns bind no single name and return `None`.
pub fn declarator_name<'a>(source: &'a str, declarator: Node) -> Option<&'a str> {
    let name = declarator.child_by_field_name("name")?;
    if name.kind() != "identifier" {
        return None;
    }
    Some(node_text(source, name))
}

/// The declaration keyword (`const` / `let` / `var`) of a declarator's
/// enclosing statement.
pub fn declaration_keyword<'a>(source: &'a str, declarator: Node) -> &'a str {
    let Some(parent) = declarator.parent() else {
        return "var";
    };
    match parent.kind() {
        // lexical_declaration starts with its `const`/`let` token.
        "lexical_declaration" => {
            let start = parent.start_byte();
            let rest = &source[start..];
            if rest.starts_with("let") {
                "let"
            } else {
                "const"
            }
        }
        _ => "var",
    }
}
