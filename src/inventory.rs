//! Symbol inventory: one normalized descriptor per declared symbol.
//!
//! Three declaration shapes are recognized — named function declarations,
//! named class declarations, and variable declarators whose initializer is a
//! function or arrow expression. Everything else (object-literal methods,
//! default exports, IIFE assignments) is out of inventory scope.

use serde::Serialize;
use tree_sitter::Node;

use crate::bundle::{Bundle, Unit};
use crate::error::QueryResult;
use crate::parse::{
    declaration_keyword, declarator_name, declared_name, is_function_value, node_text,
    parse_module, ParseOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    VariableFunction,
}

/// Normalized view of one declaration, derived on demand and never stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDescriptor {
    pub unit_id: String,
    pub unit_path: String,
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based source line of the declaration start.
    pub start_line: u32,
    pub line_count: u32,
    pub parameters: Vec<String>,
    pub signature: String,
}

/// Walk every unit (or the single filtered one) and emit descriptors in
/// unit order, pre-order within each tree, truncated at `limit`.
///
/// A unit that fails to parse contributes zero descriptors; the scan
/// continues with the remaining units. A filter naming an unknown unit id is
/// a caller error and fails `UnitNotFound`.
pub fn scan_units(
    bundle: &Bundle,
    unit_filter: Option<&str>,
    limit: usize,
    opts: &ParseOptions,
) -> QueryResult<Vec<SymbolDescriptor>> {
    let mut out: Vec<SymbolDescriptor> = Vec::new();

    if let Some(id) = unit_filter {
        let unit = bundle.require(id)?;
        collect_unit(unit, limit, opts, &mut out);
        return Ok(out);
    }

    for unit in bundle.units() {
        if out.len() >= limit {
            break;
        }
        collect_unit(unit, limit, opts, &mut out);
    }
    Ok(out)
}

/// Inventory of one standalone document (no unit cache involved).
///
/// Unlike the multi-unit scan, a parse failure here surfaces to the caller.
pub fn scan_source(
    source: &str,
    path: &str,
    limit: usize,
    opts: &ParseOptions,
) -> QueryResult<Vec<SymbolDescriptor>> {
    let tree = parse_module(source, opts)?;
    let unit = Unit::new("0", path, source);
    let mut out = Vec::new();
    walk(tree.root_node(), source, &unit, limit, &mut out);
    Ok(out)
}

fn collect_unit(unit: &Unit, limit: usize, opts: &ParseOptions, out: &mut Vec<SymbolDescriptor>) {
    // Tolerance policy: malformed units are skipped, never fatal.
    let Ok(tree) = parse_module(&unit.code, opts) else {
        return;
    };
    walk(tree.root_node(), &unit.code, unit, limit, out);
}

fn walk(node: Node, source: &str, unit: &Unit, limit: usize, out: &mut Vec<SymbolDescriptor>) {
    if out.len() >= limit {
        return;
    }

    if let Some(descriptor) = describe(node, source, unit) {
        out.push(descriptor);
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        if out.len() >= limit {
            return;
        }
        walk(child, source, unit, limit, out);
    }
}

fn describe(node: Node, source: &str, unit: &Unit) -> Option<SymbolDescriptor> {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            let name = declared_name(source, node)?.to_string();
            let parameters = render_parameters(node.child_by_field_name("parameters"), source);
            let star = if node.kind() == "generator_function_declaration" {
                "*"
            } else {
                ""
            };
            let signature = format!("function{star} {name}({})", parameters.join(", "));
            Some(descriptor_at(
                node,
                unit,
                name,
                SymbolKind::Function,
                parameters,
                signature,
            ))
        }
        "class_declaration" => {
            let name = declared_name(source, node)?.to_string();
            let signature = format!("class {name}");
            Some(descriptor_at(
                node,
                unit,
                name,
                SymbolKind::Class,
                Vec::new(),
                signature,
            ))
        }
        "variable_declarator" => {
            let value = node.child_by_field_name("value")?;
            if !is_function_value(value.kind()) {
                return None;
            }
            let name = declarator_name(source, node)?.to_string();
            let keyword = declaration_keyword(source, node);
            let parameters = arrow_or_function_parameters(value, source);
            let signature = if value.kind() == "arrow_function" {
                format!("{keyword} {name} = ({}) => {{ ... }}", parameters.join(", "))
            } else {
                format!("{keyword} {name} = function({}) {{ ... }}", parameters.join(", "))
            };
            // The descriptor spans the whole declaration statement when the
            // declarator has one; bare declarators span themselves.
            let span_node = node.parent().unwrap_or(node);
            Some(descriptor_at(
                span_node,
                unit,
                name,
                SymbolKind::VariableFunction,
                parameters,
                signature,
            ))
        }
        _ => None,
    }
}

fn descriptor_at(
    node: Node,
    unit: &Unit,
    name: String,
    kind: SymbolKind,
    parameters: Vec<String>,
    signature: String,
) -> SymbolDescriptor {
    let start = node.start_position().row as u32 + 1;
    let end = node.end_position().row as u32 + 1;
    SymbolDescriptor {
        unit_id: unit.id.clone(),
        unit_path: unit.path.clone(),
        name,
        kind,
        start_line: start,
        line_count: end - start + 1,
        parameters,
        signature,
    }
}

fn arrow_or_function_parameters(value: Node, source: &str) -> Vec<String> {
    if let Some(params) = value.child_by_field_name("parameters") {
        return render_parameters(Some(params), source);
    }
    // `x => x + 1` — single unparenthesized arrow parameter.
    if let Some(single) = value.child_by_field_name("parameter") {
        return vec![node_text(source, single).to_string()];
    }
    Vec::new()
}

/// Render a `formal_parameters` list into display strings:
/// identifier → name; default value → `name?`; rest → `...name`;
/// destructured pattern → `{destructured}`.
fn render_parameters(params: Option<Node>, source: &str) -> Vec<String> {
    let Some(params) = params else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        // The TS grammar wraps each entry in required/optional_parameter,
        // with any default value in the wrapper's `value` field. The plain
        // JS grammar uses a bare assignment_pattern instead; both occur.
        let mut defaulted = child.kind() == "optional_parameter";
        let inner = match child.kind() {
            "required_parameter" | "optional_parameter" => {
                if child.child_by_field_name("value").is_some() {
                    defaulted = true;
                }
                child.child_by_field_name("pattern").unwrap_or(child)
            }
            _ => child,
        };
        let rendered = match inner.kind() {
            "identifier" => {
                let name = node_text(source, inner);
                if defaulted {
                    format!("{name}?")
                } else {
                    name.to_string()
                }
            }
            "assignment_pattern" => match inner.child_by_field_name("left") {
                Some(left) if left.kind() == "identifier" => {
                    format!("{}?", node_text(source, left))
                }
                _ => "{destructured}".to_string(),
            },
            "rest_pattern" => match inner.named_child(0) {
                Some(arg) if arg.kind() == "identifier" => {
                    format!("...{}", node_text(source, arg))
                }
                _ => "...{destructured}".to_string(),
            },
            "object_pattern" | "array_pattern" => "{destructured}".to_string(),
            // `this` pseudo-parameters, comments — render as written.
            _ => node_text(source, inner).to_string(),
        };
        out.push(rendered);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Unit;

    fn scan(code: &str) -> Vec<SymbolDescriptor> {
        let bundle = Bundle::new(vec![Unit::new("1", "src/app.js", code)]);
        scan_units(&bundle, None, 100, &ParseOptions::default()).unwrap()
    }

    // ── Shapes ───────────────────────────────────────────────────────────

    #[test]
    fn recognizes_all_three_shapes() {
        let syms = scan(
            "function myFunc(a,b){return a+b;}\nconst myArrow=()=>{};\nclass MyClass{}",
        );
        let names: Vec<&str> = syms.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["myFunc", "myArrow", "MyClass"]);

        assert_eq!(syms[0].kind, SymbolKind::Function);
        assert_eq!(syms[0].parameters, vec!["a", "b"]);
        assert!(syms[0].signature.contains("function myFunc(a, b)"));

        assert_eq!(syms[1].kind, SymbolKind::VariableFunction);
        assert!(syms[1].signature.starts_with("const myArrow = ()"));

        assert_eq!(syms[2].kind, SymbolKind::Class);
        assert_eq!(syms[2].signature, "class MyClass");
        assert!(syms[2].parameters.is_empty());
    }

    #[test]
    fn variable_with_non_function_initializer_is_ignored() {
        let syms = scan("const n = 42; const f = function(x) { return x; };");
        assert_eq!(syms.len(), 1);
        assert_eq!(syms[0].name, "f");
        assert!(syms[0].signature.contains("const f = function(x)"));
    }

    #[test]
    fn var_keyword_is_preserved_in_signature() {
        let syms = scan("var legacy = function() {};\nlet fresh = () => {};");
        assert!(syms[0].signature.starts_with("var legacy = function()"));
        assert!(syms[1].signature.starts_with("let fresh = ()"));
    }

    #[test]
    fn nested_declarations_are_inventoried_in_preorder() {
        let syms = scan("function outer(){ function inner(){} }\nfunction after(){}");
        let names: Vec<&str> = syms.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["outer", "inner", "after"]);
    }

    // ── Parameter rendering ──────────────────────────────────────────────

    #[test]
    fn parameter_rendering_rules() {
        let syms = scan("function f(a, b = 2, ...rest) {}\nfunction g({x, y}, [z]) {}");
        assert_eq!(syms[0].parameters, vec!["a", "b?", "...rest"]);
        assert_eq!(
            syms[1].parameters,
            vec!["{destructured}", "{destructured}"]
        );
    }

    #[test]
    fn unparenthesized_arrow_parameter() {
        let syms = scan("const id = x => x;");
        assert_eq!(syms[0].parameters, vec!["x"]);
    }

    // ── Lines & limits ───────────────────────────────────────────────────

    #[test]
    fn line_numbers_are_one_based_inclusive() {
        let syms = scan("\nfunction f() {\n  return 1;\n}\n");
        assert_eq!(syms[0].start_line, 2);
        assert_eq!(syms[0].line_count, 3);
    }

    #[test]
    fn limit_truncates_across_units() {
        let bundle = Bundle::new(vec![
            Unit::new("1", "a.js", "function a1(){}\nfunction a2(){}"),
            Unit::new("2", "b.js", "function b1(){}"),
        ]);
        let syms = scan_units(&bundle, None, 2, &ParseOptions::default()).unwrap();
        assert_eq!(syms.len(), 2);
        assert_eq!(syms[1].name, "a2");
    }

    #[test]
    fn unit_filter_narrows_the_scan() {
        let bundle = Bundle::new(vec![
            Unit::new("1", "a.js", "function a1(){}"),
            Unit::new("2", "b.js", "function b1(){}"),
        ]);
        let syms = scan_units(&bundle, Some("2"), 100, &ParseOptions::default()).unwrap();
        assert_eq!(syms.len(), 1);
        assert_eq!(syms[0].name, "b1");
        assert_eq!(syms[0].unit_id, "2");

        assert!(scan_units(&bundle, Some("404"), 100, &ParseOptions::default()).is_err());
    }

    // ── Tolerance ────────────────────────────────────────────────────────

    #[test]
    fn malformed_unit_contributes_nothing_without_aborting() {
        let bundle = Bundle::new(vec![
            Unit::new("1", "bad.js", "function ((("),
            Unit::new("2", "good.js", "function ok(){}"),
        ]);
        let syms = scan_units(&bundle, None, 100, &ParseOptions::default()).unwrap();
        assert_eq!(syms.len(), 1);
        assert_eq!(syms[0].name, "ok");
    }

    #[test]
    fn scan_source_surfaces_parse_failures() {
        assert!(scan_source("function (((", "x.js", 10, &ParseOptions::default()).is_err());
        let syms = scan_source("class C {}", "x.js", 10, &ParseOptions::default()).unwrap();
        assert_eq!(syms[0].name, "C");
    }
}
