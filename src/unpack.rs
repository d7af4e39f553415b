//! The unpack collaborator: source text in, bundle decomposition out.
//!
//! The query layer only depends on the `Unpacker` trait. The built-in
//! implementation recognizes webpack-style module maps — an object literal
//! keyed by module id, or an array of factory functions — and splits each
//! factory body into its own unit with a synthetic path. Inputs with no
//! recognizable map become a single virtual entry unit, so the cache is
//! never left empty after a successful unpack.

use std::collections::HashSet;
use tree_sitter::Node;

use crate::bundle::{Bundle, Unit};
use crate::error::QueryResult;
use crate::parse::{is_function_value, node_text, parse_module, ParseOptions};
use crate::printer::pretty_print;

#[derive(Debug, Clone, Copy)]
pub struct UnpackOptions {
    /// Decompose the input into units; off means pass the text through whole.
    pub unpack: bool,
    /// Rename minified identifiers. Accepted for interface compatibility;
    /// the built-in transform leaves identifiers untouched.
    pub mangle: bool,
    /// Retry a failed parse with the TSX grammar.
    pub jsx_recovery: bool,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            unpack: true,
            mangle: false,
            jsx_recovery: true,
        }
    }
}

/// Result of one unpack call. `bundle` is absent when the transform chose
/// not to decompose (e.g. `unpack: false`).
#[derive(Debug)]
pub struct UnpackOutcome {
    pub code: String,
    pub bundle: Option<Bundle>,
}

pub trait Unpacker {
    fn unpack(&self, source: &str, opts: &UnpackOptions) -> QueryResult<UnpackOutcome>;
}

/// Splits webpack-style bundles by module map. Parse failures surface —
/// the unpack entry point is a single-document operation.
#[derive(Debug, Default)]
pub struct WebpackUnpacker;

/// Virtual entry unit identity for undecomposed inputs.
pub const ENTRY_UNIT_ID: &str = "index";
pub const ENTRY_UNIT_PATH: &str = "index.js";

impl Unpacker for WebpackUnpacker {
    fn unpack(&self, source: &str, opts: &UnpackOptions) -> QueryResult<UnpackOutcome> {
        let parse_opts = ParseOptions {
            jsx: false,
            jsx_recovery: opts.jsx_recovery,
        };
        let tree = parse_module(source, &parse_opts)?;

        if !opts.unpack {
            return Ok(UnpackOutcome {
                code: source.to_string(),
                bundle: None,
            });
        }

        let entries = find_module_map(tree.root_node(), source);
        if entries.is_empty() {
            let bundle = Bundle::new(vec![Unit::new(ENTRY_UNIT_ID, ENTRY_UNIT_PATH, source)]);
            return Ok(UnpackOutcome {
                code: source.to_string(),
                bundle: Some(bundle),
            });
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut units = Vec::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.id.clone()) {
                continue;
            }
            let path = module_path(&entry.id);
            let code = factory_body_text(entry.factory, source);
            units.push(Unit::new(entry.id, path, code));
        }

        Ok(UnpackOutcome {
            code: source.to_string(),
            bundle: Some(Bundle::new(units)),
        })
    }
}

struct MapEntry<'t> {
    id: String,
    factory: Node<'t>,
}

/// Pick the largest module-map candidate anywhere in the tree.
///
/// Object candidates must be keyed exclusively by number or string literals
/// with function-valued entries — bare-identifier keys mark ordinary object
/// literals (callback tables, exports) and disqualify the container.
fn find_module_map<'t>(root: Node<'t>, source: &str) -> Vec<MapEntry<'t>> {
    const MIN_ENTRIES: usize = 2;

    let mut best: Vec<MapEntry> = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let candidate = match node.kind() {
            "object" => object_entries(node, source),
            "array" => array_entries(node),
            _ => None,
        };
        if let Some(entries) = candidate {
            if entries.len() >= MIN_ENTRIES && entries.len() > best.len() {
                best = entries;
            }
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    best
}

fn object_entries<'t>(object: Node<'t>, source: &str) -> Option<Vec<MapEntry<'t>>> {
    let mut entries = Vec::new();
    let mut cursor = object.walk();
    for child in object.named_children(&mut cursor) {
        if child.kind() == "comment" {
            continue;
        }
        if child.kind() != "pair" {
            return None;
        }
        let key = child.child_by_field_name("key")?;
        let value = child.child_by_field_name("value")?;
        if !is_function_value(value.kind()) {
            return None;
        }
        let id = match key.kind() {
            "number" => node_text(source, key).to_string(),
            "string" => strip_string_quotes(node_text(source, key)),
            _ => return None,
        };
        entries.push(MapEntry { id, factory: value });
    }
    Some(entries)
}

fn array_entries<'t>(array: Node<'t>) -> Option<Vec<MapEntry<'t>>> {
    let mut entries = Vec::new();
    let mut cursor = array.walk();
    for (index, child) in array.named_children(&mut cursor).enumerate() {
        if child.kind() == "comment" {
            continue;
        }
        if !is_function_value(child.kind()) {
            return None;
        }
        entries.push(MapEntry {
            id: index.to_string(),
            factory: child,
        });
    }
    Some(entries)
}

/// Synthetic path for a split module. String ids that already look like
/// paths (webpack's `./src/x.js` style) are kept as-is.
fn module_path(id: &str) -> String {
    if id.contains('/') {
        id.to_string()
    } else {
        format!("modules/{id}.js")
    }
}

/// The factory's body text: statement blocks lose their braces and common
/// indent; expression-bodied arrows keep the expression verbatim.
fn factory_body_text(factory: Node, source: &str) -> String {
    let Some(body) = factory.child_by_field_name("body") else {
        return node_text(source, factory).to_string();
    };
    if body.kind() == "statement_block" {
        let inner = &source[body.start_byte() + 1..body.end_byte().saturating_sub(1)];
        let inner = inner.trim_matches(['\n', '\r']);
        return pretty_print(inner).unwrap_or_else(|_| inner.to_string());
    }
    node_text(source, body).to_string()
}

fn strip_string_quotes(s: &str) -> String {
    s.trim_matches(['"', '\'', '`']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpack(source: &str) -> UnpackOutcome {
        WebpackUnpacker
            .unpack(source, &UnpackOptions::default())
            .unwrap()
    }

    #[test]
    fn object_module_map_splits_into_units() {
        let src = r#"
(function(modules) { modules[0](); })({
  0: function(module, exports, require) {
    module.exports = require(1);
  },
  1: function(module, exports) {
    exports.greet = () => 'hi';
  }
});
"#;
        let bundle = unpack(src).bundle.unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.get("0").unwrap().path, "modules/0.js");
        assert!(bundle.get("1").unwrap().code.contains("exports.greet"));
        // Factory braces are stripped from the unit body.
        assert!(!bundle.get("1").unwrap().code.starts_with('{'));
    }

    #[test]
    fn path_style_string_ids_keep_their_path() {
        let src = r#"
__webpack_require__.m = {
  "./src/app.js": (module, exports, require) => { run(); },
  "./src/util.js": (module) => { module.exports = 1; }
};
"#;
        let bundle = unpack(src).bundle.unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.get("./src/app.js").unwrap().path, "./src/app.js");
        assert!(bundle.get("./src/app.js").unwrap().code.contains("run()"));
    }

    #[test]
    fn array_module_map_uses_positional_ids() {
        let src = r#"
webpackJsonp([0], [
  function(module, exports) { exports.a = 1; },
  function(module, exports) { exports.b = 2; },
  function(module, exports) { exports.c = 3; }
]);
"#;
        let bundle = unpack(src).bundle.unwrap();
        assert_eq!(bundle.len(), 3);
        assert!(bundle.get("2").unwrap().code.contains("exports.c"));
    }

    #[test]
    fn plain_scripts_become_a_virtual_entry_unit() {
        let bundle = unpack("function main() { return 1; }\nmain();")
            .bundle
            .unwrap();
        assert_eq!(bundle.len(), 1);
        let entry = bundle.get(ENTRY_UNIT_ID).unwrap();
        assert_eq!(entry.path, ENTRY_UNIT_PATH);
        assert!(entry.code.contains("function main"));
    }

    #[test]
    fn ordinary_object_literals_are_not_module_maps() {
        // Identifier keys mark a plain object even when values are functions.
        let src = "const handlers = { onOpen: () => {}, onClose: () => {} };";
        let bundle = unpack(src).bundle.unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.get(ENTRY_UNIT_ID).unwrap().path, ENTRY_UNIT_PATH);
    }

    #[test]
    fn unpack_false_passes_the_text_through() {
        let opts = UnpackOptions {
            unpack: false,
            ..UnpackOptions::default()
        };
        let outcome = WebpackUnpacker.unpack("const x = 1;", &opts).unwrap();
        assert!(outcome.bundle.is_none());
        assert_eq!(outcome.code, "const x = 1;");
    }

    #[test]
    fn malformed_input_fails_the_unpack() {
        assert!(WebpackUnpacker
            .unpack("function (((", &UnpackOptions::default())
            .is_err());
    }

    #[test]
    fn larger_map_wins_over_smaller_candidates() {
        let src = r#"
register({ 0: function(){ a(); }, 1: function(){ b(); } });
install({
  10: function(){ one(); },
  11: function(){ two(); },
  12: function(){ three(); }
});
"#;
        let bundle = unpack(src).bundle.unwrap();
        assert_eq!(bundle.len(), 3);
        assert!(bundle.get("10").is_some());
    }
}
