use serde::{Deserialize, Serialize};
use std::path::Path;

/// Controls how much work a single request is allowed to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Inputs larger than this are rejected before any parsing.
    pub max_input_bytes: u64,

    /// Default truncation for symbol inventory listings.
    pub default_symbol_limit: usize,

    /// Default truncation for unit search results.
    pub default_search_limit: usize,
}

/// Hard safety ceiling: inputs larger than this are **always** rejected,
/// regardless of config. Protects low-RAM machines from a 100 MB bundle.
pub const ABSOLUTE_MAX_INPUT_BYTES: u64 = 32 * 1024 * 1024;

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            // 16 MB default — production bundles are big, but not unbounded.
            max_input_bytes: 16 * 1024 * 1024,
            default_symbol_limit: 200,
            default_search_limit: 50,
        }
    }
}

/// Dialect flags handed to the parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Parse with the TSX grammar up front (for bundles that ship raw JSX).
    pub jsx: bool,

    /// Retry a failed parse with the TSX grammar before giving up.
    pub jsx_recovery: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            jsx: false,
            jsx_recovery: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: LimitsConfig,
    pub parser: ParserConfig,
}

impl Config {
    /// Effective input ceiling after applying the absolute cap.
    pub fn effective_max_input_bytes(&self) -> u64 {
        self.limits.max_input_bytes.min(ABSOLUTE_MAX_INPUT_BYTES)
    }
}

pub fn load_config(root: &Path) -> Config {
    let primary = root.join(".bundlescope.json");

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|_| Config::default())
}
