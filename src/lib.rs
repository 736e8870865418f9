//! Position and P&L accounting core for a paper-trading portfolio service:
//! trade-log folding, realized/unrealized P&L, recommendation lifecycle, and
//! per-ticker ledger summaries.

pub mod api {
    pub mod routes;
}
pub mod error;
pub mod ledger;
pub mod persistence;
pub mod pnl;
pub mod pricefeed;
pub mod recommendations;
pub mod summary;
pub mod types {
    pub mod position;
    pub mod recommendation;
    pub mod trade;
}
