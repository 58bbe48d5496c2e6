//! Typed error kinds for the core, per the error-handling design table.
//!
//! The binary and setup code use `anyhow::Result` (see `main.rs`); internal
//! component operations return `CoreError` so callers can match on kind
//! instead of parsing a message.

use std::time::Duration;

/// One variant per row of the error-handling design table.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A proxy or dork input line could not be parsed.
    #[error("failed to parse input line {line_no}: {reason}")]
    ParseInput { line_no: usize, reason: String },

    /// `ProxyPool::add` was called with an id already present in the pool.
    #[error("proxy {0} already exists in the pool")]
    AlreadyExists(String),

    /// `ProxyPool::get` found no proxy that is alive and off cooldown.
    #[error("no proxy is currently available")]
    NoAvailable,

    /// The outbound request failed at the transport layer.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response was classified as a captcha challenge.
    #[error("captcha challenge detected")]
    Captcha,

    /// The response was classified as a block page.
    #[error("request blocked by upstream")]
    Blocked,

    /// The request exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// An unrecoverable engine-level error; the scheduler should stop.
    #[error("fatal engine error: {0}")]
    FatalEngine(String),

    /// The domain ledger's backing store failed (query or pool checkout).
    #[error("domain ledger error: {0}")]
    Ledger(String),
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Ledger(e.to_string())
    }
}

impl From<r2d2::Error> for CoreError {
    fn from(e: r2d2::Error) -> Self {
        CoreError::Ledger(e.to_string())
    }
}

impl CoreError {
    /// Whether this error should retry the owning task.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Transport(_) | CoreError::Captcha | CoreError::Blocked | CoreError::Timeout(_)
        )
    }

    /// Whether this error should stop the scheduler outright.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::FatalEngine(_))
    }
}
