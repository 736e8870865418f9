//! Crate-wide error types.

use thiserror::Error;

/// Errors from the accounting core and its storage layer.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid trade: {0}")]
    InvalidTrade(&'static str),

    #[error("trade for {trade_ticker} cannot be applied to position {position_ticker}")]
    KeyMismatch {
        trade_ticker: String,
        position_ticker: String,
    },

    #[error("stale write for {ticker}: position moved from version {expected} to {found}")]
    Conflict {
        ticker: String,
        expected: u64,
        found: u64,
    },

    #[error("recommendation is already closed")]
    AlreadyClosed,

    #[error("recommendation is already open")]
    AlreadyOpen,

    #[error("an entry price greater than zero is required to open a recommendation")]
    MissingEntryPrice,

    #[error("recommendation not found")]
    RecommendationNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Price feed failures. Per-ticker and non-fatal: a failed lookup degrades
/// that ticker's unrealized P&L to unavailable, nothing else.
#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("no quote available for {0}")]
    Unavailable(String),

    #[error("price feed upstream error: {0}")]
    Upstream(String),
}
