//! Trade-log persistence: append on record, list in execution order for
//! replay and summaries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::trade::{Trade, TradeSide};

fn side_to_str(side: TradeSide) -> &'static str {
    match side {
        TradeSide::Buy => "BUY",
        TradeSide::Sell => "SELL",
    }
}

fn side_from_str(side: &str) -> TradeSide {
    match side {
        "SELL" => TradeSide::Sell,
        _ => TradeSide::Buy,
    }
}

#[derive(Debug, FromRow)]
pub struct TradeRow {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub ticker: String,
    pub side: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub notional: Decimal,
    pub executed_at: DateTime<Utc>,
    pub realized_pnl: Option<Decimal>,
}

fn trade_row_to_trade(row: &TradeRow) -> Trade {
    Trade {
        id: row.id,
        portfolio_id: row.portfolio_id,
        ticker: row.ticker.clone(),
        side: side_from_str(&row.side),
        quantity: row.quantity,
        price: row.price,
        notional: row.notional,
        executed_at: row.executed_at,
        realized_pnl: row.realized_pnl,
    }
}

/// Insert a single trade (call after each fold).
pub async fn insert_trade(pool: &PgPool, trade: &Trade) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO trades (id, portfolio_id, ticker, side, quantity, price, notional, executed_at, realized_pnl) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(trade.id)
    .bind(trade.portfolio_id)
    .bind(&trade.ticker)
    .bind(side_to_str(trade.side))
    .bind(trade.quantity)
    .bind(trade.price)
    .bind(trade.notional)
    .bind(trade.executed_at)
    .bind(trade.realized_pnl)
    .execute(pool)
    .await?;
    Ok(())
}

/// All trades in execution order (replay order for hydration).
pub async fn list_trades(pool: &PgPool) -> Result<Vec<Trade>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TradeRow>(
        "SELECT id, portfolio_id, ticker, side, quantity, price, notional, executed_at, realized_pnl \
         FROM trades ORDER BY executed_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(trade_row_to_trade).collect())
}

/// Trades for one portfolio in execution order, optional ticker filter.
pub async fn list_trades_for_portfolio(
    pool: &PgPool,
    portfolio_id: Uuid,
    ticker_filter: Option<&str>,
) -> Result<Vec<Trade>, sqlx::Error> {
    let rows = if let Some(ticker) = ticker_filter {
        sqlx::query_as::<_, TradeRow>(
            "SELECT id, portfolio_id, ticker, side, quantity, price, notional, executed_at, realized_pnl \
             FROM trades WHERE portfolio_id = $1 AND ticker = $2 ORDER BY executed_at ASC, id ASC",
        )
        .bind(portfolio_id)
        .bind(ticker.to_uppercase())
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, TradeRow>(
            "SELECT id, portfolio_id, ticker, side, quantity, price, notional, executed_at, realized_pnl \
             FROM trades WHERE portfolio_id = $1 ORDER BY executed_at ASC, id ASC",
        )
        .bind(portfolio_id)
        .fetch_all(pool)
        .await?
    };
    Ok(rows.iter().map(trade_row_to_trade).collect())
}
