//! Error taxonomy for the payment tools.
//!
//! Everything is caught at the registry dispatch boundary and rendered as a
//! `ToolResult` with `success = false`; no error escapes to the runtime as a
//! panic or an unhandled `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    /// Rejected before any storage or network access.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Caller is not permitted to invoke this tool.
    #[error("access denied for tool '{tool}'")]
    AccessDenied { tool: String },

    /// Caller exceeded the fixed-window budget for this tool.
    #[error("rate limited: retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    /// The upstream indexing API exhausted its retries. Matching treats this
    /// as "not found yet", never as a hard failure: a financial confirmation
    /// must not report failure on a network blip.
    #[error("event source unavailable: {0}")]
    SourceUnavailable(String),

    /// Unknown invoice or challenge id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not valid for the row's current status (e.g. a receipt for
    /// an unpaid invoice).
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl ToolError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ToolError::Validation(msg.into())
    }
}
