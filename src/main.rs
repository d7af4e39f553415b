use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bundlescope::bundle::{Bundle, Unit};
use bundlescope::callgraph::build_call_graph;
use bundlescope::config::load_config;
use bundlescope::inventory::{scan_source, scan_units};
use bundlescope::locator::extract_symbol;
use bundlescope::parse::ParseOptions;
use bundlescope::search::search_units;
use bundlescope::server::run_stdio_server;
use bundlescope::unpack::{UnpackOptions, Unpacker, WebpackUnpacker, ENTRY_UNIT_ID, ENTRY_UNIT_PATH};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "bundlescope")]
#[command(version)]
#[command(about = "Code intelligence for unpacked JavaScript bundles (Pure Rust MCP server)")]
struct Cli {
    /// Bundle file to unpack for one-shot queries
    #[arg(long, short = 'i', value_name = "FILE_PATH")]
    input: Option<PathBuf>,

    /// Skip decomposition: treat the whole input as a single unit
    #[arg(long)]
    no_unpack: bool,

    /// List the unpacked units as JSON
    #[arg(long)]
    list_units: bool,

    /// Hide vendor (node_modules / bundler runtime) units from --list-units
    #[arg(long)]
    exclude_vendor: bool,

    /// Print the symbol inventory as JSON
    #[arg(long)]
    symbols: bool,

    /// Extract one symbol's source text
    #[arg(long, value_name = "NAME")]
    symbol: Option<String>,

    /// Print the call graph of a symbol as JSON (requires --unit)
    #[arg(long, value_name = "NAME")]
    calls: Option<String>,

    /// Unit id scope for --symbols / --symbol / --calls
    #[arg(long, short = 'u', value_name = "UNIT_ID")]
    unit: Option<String>,

    /// Scan every unit for incoming calls (with --calls)
    #[arg(long)]
    all_units: bool,

    /// Search unit texts; prints matching units as JSON
    #[arg(long, value_name = "QUERY")]
    search: Option<String>,

    /// Treat the --search query as a case-insensitive regex
    #[arg(long)]
    regex: bool,

    /// Max results for --symbols / --search
    #[arg(long)]
    limit: Option<usize>,

    /// Inventory a standalone source file (no unpack step)
    #[arg(long, value_name = "FILE_PATH")]
    inspect: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start MCP stdio server
    Mcp,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.cmd, Some(Command::Mcp)) {
        return run_stdio_server();
    }

    let cwd = std::env::current_dir().context("Failed to get current dir")?;
    let cfg = load_config(&cwd);
    let parse_opts = ParseOptions::from_config(&cfg.parser);

    if let Some(p) = cli.inspect {
        let source = std::fs::read_to_string(&p)
            .with_context(|| format!("Failed to read {}", p.display()))?;
        let limit = cli.limit.unwrap_or(cfg.limits.default_symbol_limit);
        let symbols = scan_source(&source, &p.to_string_lossy(), limit, &parse_opts)?;
        println!("{}", serde_json::to_string_pretty(&symbols)?);
        return Ok(());
    }

    let input = cli
        .input
        .context("Missing --input (or use the `mcp` subcommand / --inspect)")?;
    let meta = std::fs::metadata(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let cap = cfg.effective_max_input_bytes();
    if meta.len() > cap {
        bail!(
            "Input {} is {} bytes; limit is {cap}",
            input.display(),
            meta.len()
        );
    }
    let source = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let opts = UnpackOptions {
        unpack: !cli.no_unpack,
        mangle: false,
        jsx_recovery: cfg.parser.jsx_recovery,
    };
    let outcome = WebpackUnpacker.unpack(&source, &opts)?;
    let bundle = outcome
        .bundle
        .unwrap_or_else(|| Bundle::new(vec![Unit::new(ENTRY_UNIT_ID, ENTRY_UNIT_PATH, outcome.code)]));

    if cli.list_units {
        let rows: Vec<serde_json::Value> = bundle
            .units()
            .iter()
            .filter(|u| !cli.exclude_vendor || !u.is_vendor())
            .map(|u| json!({ "id": u.id, "path": u.path, "vendor": u.is_vendor() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if cli.symbols {
        let limit = cli.limit.unwrap_or(cfg.limits.default_symbol_limit);
        let symbols = scan_units(&bundle, cli.unit.as_deref(), limit, &parse_opts)?;
        println!("{}", serde_json::to_string_pretty(&symbols)?);
        return Ok(());
    }

    if let Some(name) = cli.symbol.as_deref() {
        let code = match cli.unit.as_deref() {
            Some(id) => bundle.require(id)?.code.clone(),
            None => source.clone(),
        };
        println!("{}", extract_symbol(&code, name, &parse_opts)?);
        return Ok(());
    }

    if let Some(name) = cli.calls.as_deref() {
        let unit_id = cli
            .unit
            .as_deref()
            .context("Missing --unit (the unit declaring the symbol)")?;
        let graph = build_call_graph(&bundle, name, unit_id, cli.all_units, &parse_opts)?;
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    }

    if let Some(query) = cli.search.as_deref() {
        let limit = cli.limit.unwrap_or(cfg.limits.default_search_limit);
        let hits = search_units(&bundle, query, cli.regex, limit)?;
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    bail!("Nothing to do: pass --list-units, --symbols, --symbol, --calls, or --search")
}
