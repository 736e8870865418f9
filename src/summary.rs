//! Per-ticker ledger summaries: group the trade log, derive positions, mark
//! against live quotes, and sort for display.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::{PositionBook, replay};
use crate::pnl::{self, Unrealized};
use crate::pricefeed::{BatchConfig, PriceFeed, fetch_quotes};
use crate::types::trade::{Trade, TradeSide};

/// Displayable aggregate for one ticker. `unrealized_pnl` and `market_value`
/// are `None` when the price feed had no quote for an open position; a flat
/// ticker reports zero for both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerSummary {
    pub ticker: String,
    pub total_shares: Decimal,
    pub average_cost: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub total_bought: Decimal,
    pub total_sold: Decimal,
    pub last_traded_at: DateTime<Utc>,
    pub trades: Vec<Trade>,
}

impl TickerSummary {
    /// Realized plus unrealized-where-known.
    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl.unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySort {
    Ticker,
    Position,
    MarketValue,
    TotalPnl,
    LastTraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Build one summary per distinct ticker in a portfolio's trade log.
///
/// The trade log is the source of truth. A book entry is used only when its
/// last-applied trade id matches the tail of the ticker's log; anything else
/// is treated as a stale cache and recomputed from the trades.
pub async fn build_summaries(
    portfolio_id: Uuid,
    trades: &[Trade],
    book: Option<&PositionBook>,
    feed: &dyn PriceFeed,
    config: &BatchConfig,
) -> Result<Vec<TickerSummary>, LedgerError> {
    // Group by ticker, preserving first-seen order for stable sorting later.
    let mut order: Vec<String> = Vec::new();
    let mut by_ticker: HashMap<String, Vec<Trade>> = HashMap::new();
    for trade in trades.iter().filter(|t| t.portfolio_id == portfolio_id) {
        let key = trade.ticker.to_uppercase();
        if !by_ticker.contains_key(&key) {
            order.push(key.clone());
        }
        by_ticker.entry(key).or_default().push(trade.clone());
    }

    let quotes = fetch_quotes(feed, &order, config).await;

    let mut summaries = Vec::with_capacity(order.len());
    for ticker in order {
        let ticker_trades = by_ticker.remove(&ticker).unwrap_or_default();
        let last_trade_id = ticker_trades.last().map(|t| t.id);

        let position = match book {
            Some(book) => {
                let snapshot = book.snapshot(portfolio_id, &ticker).await;
                if snapshot.last_trade_id == last_trade_id && snapshot.last_trade_id.is_some() {
                    snapshot.position
                } else {
                    if snapshot.last_trade_id.is_some() {
                        warn!(%ticker, "stored position diverged from trade log, recomputing");
                    }
                    replay(portfolio_id, &ticker, &ticker_trades)?
                }
            }
            None => replay(portfolio_id, &ticker, &ticker_trades)?,
        };

        let mut total_bought = Decimal::ZERO;
        let mut total_sold = Decimal::ZERO;
        for trade in &ticker_trades {
            match trade.side {
                TradeSide::Buy => total_bought += trade.quantity,
                TradeSide::Sell => total_sold += trade.quantity,
            }
        }

        let quote = quotes.get(&ticker);
        let unrealized_pnl = match pnl::unrealized(&position, quote) {
            Unrealized::Amount(amount) => Some(amount),
            Unrealized::Flat => Some(Decimal::ZERO),
            Unrealized::PriceUnavailable => None,
        };
        let market_value = if position.is_flat() {
            Some(Decimal::ZERO)
        } else {
            quote.map(|q| pnl::market_value(&position, q.price))
        };

        summaries.push(TickerSummary {
            ticker,
            total_shares: position.quantity,
            average_cost: position.average_cost,
            realized_pnl: position.realized_pnl,
            unrealized_pnl,
            market_value,
            total_bought,
            total_sold,
            last_traded_at: ticker_trades
                .last()
                .map(|t| t.executed_at)
                .unwrap_or(DateTime::UNIX_EPOCH),
            trades: ticker_trades,
        });
    }
    Ok(summaries)
}

/// Sort in place by the selected key. The sort is stable: equal keys keep
/// their input order. Missing market value or unrealized P&L sorts as zero.
pub fn sort_summaries(summaries: &mut [TickerSummary], key: SummarySort, order: SortOrder) {
    summaries.sort_by(|a, b| {
        let ordering = match key {
            SummarySort::Ticker => a.ticker.cmp(&b.ticker),
            SummarySort::Position => a.total_shares.cmp(&b.total_shares),
            SummarySort::MarketValue => a
                .market_value
                .unwrap_or(Decimal::ZERO)
                .cmp(&b.market_value.unwrap_or(Decimal::ZERO)),
            SummarySort::TotalPnl => a.total_pnl().cmp(&b.total_pnl()),
            SummarySort::LastTraded => a.last_traded_at.cmp(&b.last_traded_at),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Cross-ticker rollup of a summary set. Tickers without a quote contribute
/// their cost basis to market value and are counted in `priced_at_cost`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub market_value: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub priced_at_cost: usize,
}

pub fn portfolio_valuation(summaries: &[TickerSummary]) -> PortfolioValuation {
    let mut valuation = PortfolioValuation {
        market_value: Decimal::ZERO,
        realized_pnl: Decimal::ZERO,
        unrealized_pnl: Decimal::ZERO,
        priced_at_cost: 0,
    };
    for summary in summaries {
        valuation.realized_pnl += summary.realized_pnl;
        match summary.market_value {
            Some(value) => {
                valuation.market_value += value;
                valuation.unrealized_pnl += summary.unrealized_pnl.unwrap_or(Decimal::ZERO);
            }
            None => {
                valuation.market_value += summary.total_shares.abs() * summary.average_cost;
                valuation.priced_at_cost += 1;
            }
        }
    }
    valuation
}
