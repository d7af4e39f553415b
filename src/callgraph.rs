//! Call graph builder: outgoing and incoming edges for one named symbol.
//!
//! Outgoing edges come from the first matching declaration's subtree only.
//! Incoming edges are gathered across candidate units, with each call site
//! attributed to its nearest enclosing function-like ancestor. Matching is
//! syntactic — `obj.target()` matches a symbol named `target` no matter what
//! `obj` is, which is the deliberate trade-off of a binding-free analysis.

use serde::Serialize;
use std::collections::HashSet;
use tree_sitter::Node;

use crate::bundle::{Bundle, Unit};
use crate::error::QueryResult;
use crate::parse::{
    declarator_name, declared_name, is_function_declaration, is_function_value, node_text,
    parse_module, ParseOptions,
};

/// A call made from inside the target symbol's body.
///
/// `callee` is a bare name, `object.method`, or `.method` when the callee
/// object is not itself a bare identifier.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingCall {
    pub callee: String,
    /// 1-based line of the call site.
    pub line: u32,
}

/// A call site elsewhere that references the target symbol.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCall {
    pub caller_unit_id: String,
    pub caller_name: String,
    pub line: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallGraph {
    pub symbol: String,
    pub unit_id: String,
    pub outgoing: Vec<OutgoingCall>,
    pub incoming: Vec<IncomingCall>,
}

/// Build the call graph for `symbol` declared in unit `unit_id`.
///
/// With `scan_all_units`, every unit whose raw text contains the symbol name
/// (cheap substring pre-filter) is scanned for incoming call sites; otherwise
/// only the target unit is. Units that fail to parse contribute nothing in
/// either phase.
pub fn build_call_graph(
    bundle: &Bundle,
    symbol: &str,
    unit_id: &str,
    scan_all_units: bool,
    opts: &ParseOptions,
) -> QueryResult<CallGraph> {
    let target = bundle.require(unit_id)?;

    let mut outgoing: Vec<OutgoingCall> = Vec::new();
    if let Ok(tree) = parse_module(&target.code, opts) {
        if let Some(decl) = find_declaration(tree.root_node(), &target.code, symbol) {
            collect_outgoing(decl, &target.code, &mut outgoing);
        }
        // No declaration found: outgoing stays empty — not an error.
    }

    let mut incoming: Vec<IncomingCall> = Vec::new();
    if scan_all_units {
        for unit in bundle.units() {
            if !unit.code.contains(symbol) {
                continue;
            }
            collect_incoming(unit, symbol, opts, &mut incoming);
        }
    } else {
        collect_incoming(target, symbol, opts, &mut incoming);
    }

    Ok(CallGraph {
        symbol: symbol.to_string(),
        unit_id: unit_id.to_string(),
        outgoing: dedup_outgoing(outgoing),
        incoming: dedup_incoming(incoming),
    })
}

// ---------------------------------------------------------------------------
// Outgoing phase
// ---------------------------------------------------------------------------

/// Pre-order search for the first declaration of `symbol`: a named function
/// declaration, a declarator initialized to a function/arrow, or a class
/// declaration (included for symmetry though typically edge-free).
fn find_declaration<'t>(node: Node<'t>, source: &str, symbol: &str) -> Option<Node<'t>> {
    let kind = node.kind();

    if (is_function_declaration(kind) || kind == "class_declaration")
        && declared_name(source, node) == Some(symbol)
    {
        return Some(node);
    }

    if kind == "variable_declarator" && declarator_name(source, node) == Some(symbol) {
        if let Some(value) = node.child_by_field_name("value") {
            if is_function_value(value.kind()) {
                return Some(node);
            }
        }
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        if let Some(found) = find_declaration(child, source, symbol) {
            return Some(found);
        }
    }
    None
}

/// Record every call expression inside the declaration subtree.
fn collect_outgoing(node: Node, source: &str, out: &mut Vec<OutgoingCall>) {
    if node.kind() == "call_expression" {
        if let Some(callee) = node.child_by_field_name("function") {
            if let Some(name) = render_callee(callee, source) {
                out.push(OutgoingCall {
                    callee: name,
                    line: node.start_position().row as u32 + 1,
                });
            }
        }
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        collect_outgoing(child, source, out);
    }
}

/// Render a callee node: bare identifier → its name; member expression with
/// an identifier property → `object.property` when the object is a bare
/// identifier, else `.property`. Anything else (computed members, call
/// results, sequence expressions) is dropped.
fn render_callee(callee: Node, source: &str) -> Option<String> {
    match callee.kind() {
        "identifier" => Some(node_text(source, callee).to_string()),
        "member_expression" => {
            let property = callee.child_by_field_name("property")?;
            if property.kind() != "property_identifier" {
                return None;
            }
            let prop = node_text(source, property);
            match callee.child_by_field_name("object") {
                Some(object) if object.kind() == "identifier" => {
                    Some(format!("{}.{prop}", node_text(source, object)))
                }
                _ => Some(format!(".{prop}")),
            }
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Incoming phase
// ---------------------------------------------------------------------------

fn collect_incoming(unit: &Unit, symbol: &str, opts: &ParseOptions, out: &mut Vec<IncomingCall>) {
    // Tolerance policy: malformed units are skipped, never fatal.
    let Ok(tree) = parse_module(&unit.code, opts) else {
        return;
    };
    visit_call_sites(tree.root_node(), &unit.code, symbol, unit, out);
}

fn visit_call_sites(
    node: Node,
    source: &str,
    symbol: &str,
    unit: &Unit,
    out: &mut Vec<IncomingCall>,
) {
    if node.kind() == "call_expression" && callee_matches(node, source, symbol) {
        out.push(IncomingCall {
            caller_unit_id: unit.id.clone(),
            caller_name: resolve_caller(node, source),
            line: node.start_position().row as u32 + 1,
        });
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        visit_call_sites(child, source, symbol, unit, out);
    }
}

/// A call references `symbol` when its callee is a bare identifier of that
/// name, or a member expression whose property identifier is that name.
fn callee_matches(call: Node, source: &str, symbol: &str) -> bool {
    let Some(callee) = call.child_by_field_name("function") else {
        return false;
    };
    match callee.kind() {
        "identifier" => node_text(source, callee) == symbol,
        "member_expression" => callee
            .child_by_field_name("property")
            .map(|p| p.kind() == "property_identifier" && node_text(source, p) == symbol)
            .unwrap_or(false),
        _ => false,
    }
}

/// Label the caller by walking to the nearest enclosing function-like node.
fn resolve_caller(call: Node, source: &str) -> String {
    let mut current = call.parent();
    while let Some(node) = current {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                return declared_name(source, node)
                    .map(str::to_string)
                    .unwrap_or_else(|| "(anonymous function)".to_string());
            }
            // Class methods carry their own key.
            "method_definition" => {
                return node
                    .child_by_field_name("name")
                    .map(|n| node_text(source, n).to_string())
                    .unwrap_or_else(|| "(anonymous function)".to_string());
            }
            kind if is_function_value(kind) => {
                // A function value takes its variable's name when directly
                // bound to a declarator; otherwise it stays anonymous.
                if let Some(parent) = node.parent() {
                    if parent.kind() == "variable_declarator" {
                        if let Some(name) = declarator_name(source, parent) {
                            return name.to_string();
                        }
                    }
                }
                return "(anonymous function)".to_string();
            }
            _ => {}
        }
        current = node.parent();
    }
    "(top-level)".to_string()
}

// ---------------------------------------------------------------------------
// Deduplication — set-based; discovery order is not part of the contract.
// ---------------------------------------------------------------------------

fn dedup_outgoing(edges: Vec<OutgoingCall>) -> Vec<OutgoingCall> {
    let set: HashSet<OutgoingCall> = edges.into_iter().collect();
    let mut out: Vec<OutgoingCall> = set.into_iter().collect();
    out.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.callee.cmp(&b.callee)));
    out
}

fn dedup_incoming(edges: Vec<IncomingCall>) -> Vec<IncomingCall> {
    let set: HashSet<IncomingCall> = edges.into_iter().collect();
    let mut out: Vec<IncomingCall> = set.into_iter().collect();
    out.sort_by(|a, b| {
        a.caller_unit_id
            .cmp(&b.caller_unit_id)
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.caller_name.cmp(&b.caller_name))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Unit;

    fn graph_for(code: &str, symbol: &str) -> CallGraph {
        let bundle = Bundle::new(vec![Unit::new("1", "src/app.js", code)]);
        build_call_graph(&bundle, symbol, "1", true, &ParseOptions::default()).unwrap()
    }

    // ── Outgoing ─────────────────────────────────────────────────────────

    #[test]
    fn outgoing_and_incoming_for_a_simple_chain() {
        let code = "function target(){ helper(); }\nfunction helper(){}\nfunction caller(){ target(); }";
        let graph = graph_for(code, "target");

        assert!(graph.outgoing.iter().any(|c| c.callee == "helper"));
        assert!(graph.incoming.iter().any(|c| c.caller_name == "caller"));
    }

    #[test]
    fn member_callees_are_rendered_by_object_shape() {
        let code = "function run(){ console.log(1); this.emit('x'); a.b.c(); }";
        let graph = graph_for(code, "run");
        let callees: Vec<&str> = graph.outgoing.iter().map(|c| c.callee.as_str()).collect();

        assert!(callees.contains(&"console.log"));
        // `this` and `a.b` are not bare identifiers — object is elided.
        assert!(callees.contains(&".emit"));
        assert!(callees.contains(&".c"));
    }

    #[test]
    fn computed_callees_are_dropped() {
        let code = "function run(){ table[key](); }";
        let graph = graph_for(code, "run");
        assert!(graph.outgoing.is_empty());
    }

    #[test]
    fn outgoing_is_scoped_to_the_declaration_subtree() {
        let code = "function target(){ inside(); }\nfunction other(){ outside(); }";
        let graph = graph_for(code, "target");
        let callees: Vec<&str> = graph.outgoing.iter().map(|c| c.callee.as_str()).collect();
        assert_eq!(callees, vec!["inside"]);
    }

    #[test]
    fn arrow_bound_declarations_have_outgoing_edges() {
        let code = "const target = () => { helper(); };\nfunction helper(){}";
        let graph = graph_for(code, "target");
        assert!(graph.outgoing.iter().any(|c| c.callee == "helper"));
    }

    #[test]
    fn missing_declaration_yields_empty_outgoing_not_an_error() {
        let code = "function a(){ phantom(); }";
        let graph = graph_for(code, "phantom");
        assert!(graph.outgoing.is_empty());
        // The call site still shows up as incoming.
        assert_eq!(graph.incoming.len(), 1);
        assert_eq!(graph.incoming[0].caller_name, "a");
    }

    // ── Incoming attribution ─────────────────────────────────────────────

    #[test]
    fn caller_labels_cover_all_shapes() {
        let code = r#"
function named(){ target(); }
const bound = () => { target(); };
class Widget { refresh() { target(); } }
setTimeout(function(){ target(); }, 0);
target();
function target(){}
"#;
        let graph = graph_for(code, "target");
        let callers: Vec<&str> = graph
            .incoming
            .iter()
            .map(|c| c.caller_name.as_str())
            .collect();

        assert!(callers.contains(&"named"));
        assert!(callers.contains(&"bound"));
        assert!(callers.contains(&"refresh"));
        assert!(callers.contains(&"(anonymous function)"));
        assert!(callers.contains(&"(top-level)"));
    }

    #[test]
    fn method_style_call_sites_match_by_property() {
        let code = "function use(api){ api.target(); }\nfunction target(){}";
        let graph = graph_for(code, "target");
        assert!(graph.incoming.iter().any(|c| c.caller_name == "use"));
    }

    // ── Multi-unit behavior ──────────────────────────────────────────────

    #[test]
    fn scan_all_units_crosses_unit_boundaries() {
        let bundle = Bundle::new(vec![
            Unit::new("1", "a.js", "function target(){}"),
            Unit::new("2", "b.js", "function remote(){ target(); }"),
            Unit::new("3", "c.js", "function unrelated(){}"),
        ]);
        let graph =
            build_call_graph(&bundle, "target", "1", true, &ParseOptions::default()).unwrap();
        assert_eq!(graph.incoming.len(), 1);
        assert_eq!(graph.incoming[0].caller_unit_id, "2");
        assert_eq!(graph.incoming[0].caller_name, "remote");

        // Without the flag, only the target unit is scanned.
        let local =
            build_call_graph(&bundle, "target", "1", false, &ParseOptions::default()).unwrap();
        assert!(local.incoming.is_empty());
    }

    #[test]
    fn malformed_units_are_skipped_in_the_incoming_scan() {
        let bundle = Bundle::new(vec![
            Unit::new("1", "a.js", "function target(){}"),
            Unit::new("2", "broken.js", "target((("),
            Unit::new("3", "b.js", "function ok(){ target(); }"),
        ]);
        let graph =
            build_call_graph(&bundle, "target", "1", true, &ParseOptions::default()).unwrap();
        assert_eq!(graph.incoming.len(), 1);
        assert_eq!(graph.incoming[0].caller_unit_id, "3");
    }

    #[test]
    fn unknown_target_unit_is_an_error() {
        let bundle = Bundle::new(vec![Unit::new("1", "a.js", "function t(){}")]);
        assert!(build_call_graph(&bundle, "t", "404", true, &ParseOptions::default()).is_err());
    }

    // ── Dedup ────────────────────────────────────────────────────────────

    #[test]
    fn identical_edges_collapse() {
        let code = "function target(){ helper(); helper(); }\nfunction helper(){}";
        let graph = graph_for(code, "target");
        let helpers: Vec<&OutgoingCall> = graph
            .outgoing
            .iter()
            .filter(|c| c.callee == "helper")
            .collect();
        // Same callee on the same line collapses to one edge.
        assert_eq!(helpers.len(), 1);
    }

    #[test]
    fn same_callee_on_different_lines_is_kept() {
        let code = "function target(){\n  helper();\n  helper();\n}\nfunction helper(){}";
        let graph = graph_for(code, "target");
        let helpers: Vec<&OutgoingCall> = graph
            .outgoing
            .iter()
            .filter(|c| c.callee == "helper")
            .collect();
        assert_eq!(helpers.len(), 2);
    }
}
