use anyhow::Result;
use serde_json::json;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::bundle::{Bundle, BundleCache, Unit};
use crate::callgraph::build_call_graph;
use crate::config::{load_config, Config};
use crate::error::QueryError;
use crate::inventory::scan_units;
use crate::locator::extract_symbol;
use crate::parse::ParseOptions;
use crate::search::search_units;
use crate::unpack::{UnpackOptions, Unpacker, WebpackUnpacker, ENTRY_UNIT_ID, ENTRY_UNIT_PATH};

pub struct ServerState {
    cfg: Config,
    cache: BundleCache,
    unpacker: WebpackUnpacker,
}

impl ServerState {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            cache: BundleCache::new(),
            unpacker: WebpackUnpacker,
        }
    }

    fn parse_opts(&self) -> ParseOptions {
        ParseOptions::from_config(&self.cfg.parser)
    }

    /// Resolve the `code` / `path` argument pair into source text.
    fn load_input(&self, args: &serde_json::Value) -> Result<String> {
        if let Some(code) = args.get("code").and_then(|v| v.as_str()) {
            if !code.is_empty() {
                return Ok(code.to_string());
            }
        }
        if let Some(path) = args.get("path").and_then(|v| v.as_str()) {
            let meta = std::fs::metadata(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {path}: {e}"))?;
            let cap = self.cfg.effective_max_input_bytes();
            if meta.len() > cap {
                anyhow::bail!("Input {path} is {} bytes; limit is {cap}", meta.len());
            }
            return std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {path}: {e}"));
        }
        Err(QueryError::MissingInput.into())
    }

    fn tool_list(&self, id: serde_json::Value) -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "tools": [
                    {
                        "name": "unpack_bundle",
                        "description": "📦 Run this FIRST. Unpacks a bundled/webpacked JavaScript file into addressable units (modules) and caches them for every other tool. Replaces any previously cached bundle wholesale.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "code": { "type": "string", "description": "Inline bundle source. Either this or `path` is required." },
                                "path": { "type": "string", "description": "Path to the bundle file on disk." },
                                "unpack": { "type": "boolean", "description": "Decompose into module units (default true)." },
                                "mangle": { "type": "boolean", "description": "Rename minified identifiers (accepted; the built-in transform is a no-op)." },
                                "jsxRecovery": { "type": "boolean", "description": "Retry failed parses with the TSX grammar (default true)." }
                            }
                        }
                    },
                    {
                        "name": "list_units",
                        "description": "🗂 List every unit in the cached bundle with its path and vendor flag. Use includeVendor=false to hide node_modules / webpack runtime units.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "includeVendor": { "type": "boolean", "description": "Include third-party/build-tooling units (default true)." }
                            }
                        }
                    },
                    {
                        "name": "get_unit",
                        "description": "📄 Return the raw source text of one cached unit by id.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "unitId": { "type": "string" }
                            },
                            "required": ["unitId"]
                        }
                    },
                    {
                        "name": "get_symbol",
                        "description": "⚡ Extract the exact source of a named symbol (function, class, or function-valued variable). Reads from a cached unit (`unitId`), inline `code`, or a file `path`.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string", "description": "Exact symbol name." },
                                "unitId": { "type": "string", "description": "Cached unit to search." },
                                "code": { "type": "string", "description": "Inline source to search instead of the cache." },
                                "path": { "type": "string", "description": "File to search instead of the cache." }
                            },
                            "required": ["name"]
                        }
                    },
                    {
                        "name": "list_symbols",
                        "description": "🔭 Inventory of declared symbols (functions, classes, function-valued variables) across cached units, with parameters and signatures.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "unitId": { "type": "string", "description": "Restrict the inventory to one unit." },
                                "limit": { "type": "integer", "description": "Max descriptors returned." }
                            }
                        }
                    },
                    {
                        "name": "call_graph",
                        "description": "🕸 Outgoing calls made by a symbol and incoming call sites referencing it, with caller attribution. Set scanAllUnits to search the whole bundle for callers.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "symbolName": { "type": "string" },
                                "unitId": { "type": "string", "description": "Unit declaring the symbol." },
                                "scanAllUnits": { "type": "boolean", "description": "Scan every cached unit for incoming calls (default false)." }
                            },
                            "required": ["symbolName", "unitId"]
                        }
                    },
                    {
                        "name": "search_units",
                        "description": "🔎 Find cached units by literal substring or case-insensitive regex over their raw text.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "query": { "type": "string" },
                                "isRegex": { "type": "boolean", "description": "Treat query as a regex (default false)." },
                                "limit": { "type": "integer", "description": "Max units returned." }
                            },
                            "required": ["query"]
                        }
                    }
                ]
            }
        })
    }

    fn tool_call(&mut self, id: serde_json::Value, params: &serde_json::Value) -> serde_json::Value {
        let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        let ok = |text: String| {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{"type":"text","text": text }], "isError": false }
            })
        };

        let err = |msg: String| {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{"type":"text","text": msg }], "isError": true }
            })
        };

        match name {
            "unpack_bundle" => {
                let source = match self.load_input(&args) {
                    Ok(s) => s,
                    Err(e) => return err(format!("unpack failed: {e}")),
                };
                let opts = UnpackOptions {
                    unpack: args.get("unpack").and_then(|v| v.as_bool()).unwrap_or(true),
                    mangle: args.get("mangle").and_then(|v| v.as_bool()).unwrap_or(false),
                    jsx_recovery: args
                        .get("jsxRecovery")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(self.cfg.parser.jsx_recovery),
                };
                let outcome = match self.unpacker.unpack(&source, &opts) {
                    Ok(o) => o,
                    Err(e) => return err(format!("unpack failed: {e}")),
                };
                let bundle = outcome.bundle.unwrap_or_else(|| {
                    Bundle::new(vec![Unit::new(ENTRY_UNIT_ID, ENTRY_UNIT_PATH, outcome.code)])
                });
                let snapshot = self.cache.replace(bundle);
                crate::debug_log!(
                    "unpack_bundle: {} units ({} vendor)",
                    snapshot.len(),
                    snapshot.vendor_count()
                );
                ok(json!({
                    "unitCount": snapshot.len(),
                    "vendorCount": snapshot.vendor_count(),
                })
                .to_string())
            }
            "list_units" => {
                let include_vendor = args
                    .get("includeVendor")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true);
                let snapshot = match self.cache.current() {
                    Ok(s) => s,
                    Err(e) => return err(e.to_string()),
                };
                let rows: Vec<serde_json::Value> = snapshot
                    .units()
                    .iter()
                    .filter(|u| include_vendor || !u.is_vendor())
                    .map(|u| json!({ "id": u.id, "path": u.path, "vendor": u.is_vendor() }))
                    .collect();
                ok(serde_json::to_string_pretty(&rows).unwrap_or_else(|e| e.to_string()))
            }
            "get_unit" => {
                let Some(unit_id) = args.get("unitId").and_then(|v| v.as_str()) else {
                    return err("Missing unitId".to_string());
                };
                let snapshot = match self.cache.current() {
                    Ok(s) => s,
                    Err(e) => return err(e.to_string()),
                };
                match snapshot.require(unit_id) {
                    Ok(unit) => ok(unit.code.clone()),
                    Err(e) => err(e.to_string()),
                }
            }
            "get_symbol" => {
                let Some(sym) = args.get("name").and_then(|v| v.as_str()) else {
                    return err("Missing name".to_string());
                };
                let source = if let Some(unit_id) = args.get("unitId").and_then(|v| v.as_str()) {
                    let snapshot = match self.cache.current() {
                        Ok(s) => s,
                        Err(e) => return err(e.to_string()),
                    };
                    match snapshot.require(unit_id) {
                        Ok(unit) => unit.code.clone(),
                        Err(e) => return err(e.to_string()),
                    }
                } else {
                    match self.load_input(&args) {
                        Ok(s) => s,
                        Err(e) => return err(format!("get_symbol failed: {e}")),
                    }
                };
                match extract_symbol(&source, sym, &self.parse_opts()) {
                    Ok(text) => ok(text),
                    Err(e) => err(e.to_string()),
                }
            }
            "list_symbols" => {
                let unit_id = args.get("unitId").and_then(|v| v.as_str());
                let limit = args
                    .get("limit")
                    .and_then(|v| v.as_u64())
                    .map(|n| n as usize)
                    .unwrap_or(self.cfg.limits.default_symbol_limit);
                let snapshot = match self.cache.current() {
                    Ok(s) => s,
                    Err(e) => return err(e.to_string()),
                };
                match scan_units(&snapshot, unit_id, limit, &self.parse_opts()) {
                    Ok(symbols) => {
                        ok(serde_json::to_string_pretty(&symbols).unwrap_or_else(|e| e.to_string()))
                    }
                    Err(e) => err(e.to_string()),
                }
            }
            "call_graph" => {
                let Some(sym) = args.get("symbolName").and_then(|v| v.as_str()) else {
                    return err("Missing symbolName".to_string());
                };
                let Some(unit_id) = args.get("unitId").and_then(|v| v.as_str()) else {
                    return err("Missing unitId".to_string());
                };
                let scan_all = args
                    .get("scanAllUnits")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let snapshot = match self.cache.current() {
                    Ok(s) => s,
                    Err(e) => return err(e.to_string()),
                };
                match build_call_graph(&snapshot, sym, unit_id, scan_all, &self.parse_opts()) {
                    Ok(graph) => {
                        ok(serde_json::to_string_pretty(&graph).unwrap_or_else(|e| e.to_string()))
                    }
                    Err(e) => err(e.to_string()),
                }
            }
            "search_units" => {
                let Some(query) = args.get("query").and_then(|v| v.as_str()) else {
                    return err("Missing query".to_string());
                };
                let is_regex = args
                    .get("isRegex")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let limit = args
                    .get("limit")
                    .and_then(|v| v.as_u64())
                    .map(|n| n as usize)
                    .unwrap_or(self.cfg.limits.default_search_limit);
                let snapshot = match self.cache.current() {
                    Ok(s) => s,
                    Err(e) => return err(e.to_string()),
                };
                match search_units(&snapshot, query, is_regex, limit) {
                    Ok(hits) => {
                        ok(serde_json::to_string_pretty(&hits).unwrap_or_else(|e| e.to_string()))
                    }
                    Err(e) => err(e.to_string()),
                }
            }
            _ => err(format!("Tool not found: {name}")),
        }
    }
}

pub fn run_stdio_server() -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    let cwd = std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
    let mut state = ServerState::new(load_config(&cwd));

    for line in stdin.lock().lines() {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }

        let msg: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        // JSON-RPC notifications have no "id" field — don't respond.
        let has_id = msg.get("id").is_some();
        if !has_id {
            continue;
        }

        let id = msg.get("id").cloned().unwrap_or(json!(null));
        let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("");

        let reply = match method {
            "initialize" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": msg.get("params").and_then(|p| p.get("protocolVersion")).cloned().unwrap_or(json!("2024-11-05")),
                    "capabilities": { "tools": { "listChanged": true } },
                    "serverInfo": { "name": "bundlescope", "version": "0.3.1" }
                }
            }),
            "ping" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {}
            }),
            "tools/list" => state.tool_list(id),
            "tools/call" => {
                let params = msg.get("params").cloned().unwrap_or(json!({}));
                state.tool_call(id, &params)
            }
            // Return empty lists for resources/prompts — we don't implement them.
            "resources/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "resources": [] }
            }),
            "prompts/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "prompts": [] }
            }),
            _ => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {method}") }
            }),
        };

        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }

    Ok(())
}
