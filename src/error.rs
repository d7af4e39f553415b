use thiserror::Error;

/// Unified error type for bundle queries.
///
/// Every query surface returns one of these; the MCP server and CLI render
/// the `Display` message to the caller verbatim. Per-unit failures inside
/// multi-unit scans are *not* surfaced through this type — those units are
/// skipped and the scan continues.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("No bundle loaded — run unpack_bundle first")]
    NoBundle,

    #[error("Unit `{0}` not found in the current bundle")]
    UnitNotFound(String),

    #[error("Symbol `{0}` not found")]
    SymbolNotFound(String),

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),

    #[error("Missing input: provide inline code or a file path")]
    MissingInput,

    #[error("Parse failed: {0}")]
    ParseFailure(String),
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;
